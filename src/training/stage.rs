use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::{AppError, Result};

/// Progress of one training run
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, EnumString, Display,
)]
pub enum TrainingStage {
    Raw,
    Cleaned,
    Filtered,
    Encoded,
    Split,
    Fitted,
    Evaluated,
    Persisted,
}

impl TrainingStage {
    /// The only stage reachable from this one
    pub fn next(&self) -> Option<TrainingStage> {
        match self {
            TrainingStage::Raw => Some(TrainingStage::Cleaned),
            TrainingStage::Cleaned => Some(TrainingStage::Filtered),
            TrainingStage::Filtered => Some(TrainingStage::Encoded),
            TrainingStage::Encoded => Some(TrainingStage::Split),
            TrainingStage::Split => Some(TrainingStage::Fitted),
            TrainingStage::Fitted => Some(TrainingStage::Evaluated),
            TrainingStage::Evaluated => Some(TrainingStage::Persisted),
            TrainingStage::Persisted => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

/// Enforces that stages are entered strictly in order
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: TrainingStage,
    history: Vec<TrainingStage>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: TrainingStage::Raw,
            history: vec![TrainingStage::Raw],
        }
    }

    pub fn current(&self) -> TrainingStage {
        self.current
    }

    pub fn history(&self) -> &[TrainingStage] {
        &self.history
    }

    /// Move to `target`, which must directly follow the current stage
    pub fn advance(&mut self, target: TrainingStage) -> Result<()> {
        if self.current.next() != Some(target) {
            return Err(AppError::InvalidStateTransition(format!(
                "cannot move from {} to {}",
                self.current, target
            )));
        }

        debug!(from = %self.current, to = %target, "Training stage");
        self.current = target;
        self.history.push(target);
        Ok(())
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_full_sequence() {
        let mut tracker = StageTracker::new();
        let mut stage = TrainingStage::Raw;
        while let Some(next) = stage.next() {
            tracker.advance(next).unwrap();
            stage = next;
        }

        assert_eq!(tracker.current(), TrainingStage::Persisted);
        assert!(tracker.current().is_terminal());
        assert_eq!(tracker.history().len(), 8);
    }

    #[test]
    fn test_skipping_a_stage_fails() {
        let mut tracker = StageTracker::new();
        let err = tracker.advance(TrainingStage::Filtered).unwrap_err();

        assert!(matches!(err, AppError::InvalidStateTransition(_)));
        assert_eq!(tracker.current(), TrainingStage::Raw);
    }

    #[test]
    fn test_going_back_fails() {
        let mut tracker = StageTracker::new();
        tracker.advance(TrainingStage::Cleaned).unwrap();
        assert!(tracker.advance(TrainingStage::Raw).is_err());
        assert!(tracker.advance(TrainingStage::Cleaned).is_err());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(TrainingStage::Fitted.to_string(), "Fitted");
        assert_eq!(TrainingStage::from_str("Split").unwrap(), TrainingStage::Split);
    }
}
