use crate::config::ModelConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hyperparameters shared by the tree ensembles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Number of trees
    pub n_estimators: usize,

    /// Maximum depth (`None` means unlimited)
    pub max_depth: Option<usize>,

    /// Minimum samples required to split a node
    pub min_samples_split: usize,

    /// Minimum samples per leaf
    pub min_samples_leaf: usize,

    /// Fraction of feature columns each tree sees
    pub feature_fraction: f64,

    /// Weight samples inversely to class frequency
    pub class_weighting: bool,

    /// Base seed; tree `i` uses `seed + i`
    pub seed: u64,
}

impl TreeParams {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            n_estimators: config.n_estimators.max(1),
            max_depth: (config.max_depth > 0).then_some(config.max_depth),
            min_samples_split: config.min_samples_split.max(2),
            min_samples_leaf: config.min_samples_leaf.max(1),
            feature_fraction: config.feature_fraction.clamp(0.01, 1.0),
            class_weighting: config.class_weighting,
            seed: config.seed,
        }
    }

    /// Key/value view for reports and metadata
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("n_estimators".to_string(), self.n_estimators.to_string());
        map.insert(
            "max_depth".to_string(),
            self.max_depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "none".to_string()),
        );
        map.insert(
            "min_samples_split".to_string(),
            self.min_samples_split.to_string(),
        );
        map.insert(
            "min_samples_leaf".to_string(),
            self.min_samples_leaf.to_string(),
        );
        map.insert(
            "feature_fraction".to_string(),
            self.feature_fraction.to_string(),
        );
        map.insert(
            "class_weighting".to_string(),
            self.class_weighting.to_string(),
        );
        map
    }
}

impl Default for TreeParams {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default())
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Bootstrap forest of Gini trees
    RandomForest,

    /// Entropy trees on class-balanced resamples
    BalancedBagging,

    /// Weighted soft voting over other models
    VotingEnsemble,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::RandomForest => write!(f, "Random Forest"),
            ModelType::BalancedBagging => write!(f, "Balanced Bagging"),
            ModelType::VotingEnsemble => write!(f, "Voting Ensemble"),
        }
    }
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged precision/recall/F1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Classification report for one label column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Accuracy
    pub accuracy: f64,

    /// Unweighted mean over classes
    pub macro_avg: AverageMetrics,

    /// Support-weighted mean over classes
    pub weighted_avg: AverageMetrics,

    /// Per-class metrics keyed by class name
    pub per_class: BTreeMap<String, ClassMetrics>,
}

/// One (true, predicted) confusion with its frequency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionPair {
    pub true_label: String,
    pub predicted_label: String,
    pub count: usize,
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Number of classes
    pub n_classes: usize,

    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,

    /// Validation report, once evaluated
    pub validation_report: Option<ClassificationReport>,
}
