/// Training orchestration
///
/// - Stage tracking from raw data to persisted artifacts
/// - Cleaning, filtering, encoding, splitting, fitting and evaluation
/// - The JSON training report

pub mod report;
pub mod stage;
pub mod trainer;

pub use report::{ColumnReport, StageShape, TrainingReport};
pub use stage::{StageTracker, TrainingStage};
pub use trainer::{Trainer, TrainingOutcome};
