/// Feature and model pipeline for crime report classification
///
/// This module provides:
/// - Label encoding per label column
/// - TF-IDF n-gram feature extraction
/// - Tree ensembles (random forest, balanced bagging) and soft voting
/// - Grid search under stratified cross-validation
/// - Classification reports and confusion analysis
/// - The persisted two-column model bundle

pub mod bagging;
pub mod classifier;
pub mod encoder;
pub mod features;
pub mod forest;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod voting;

pub use bagging::BalancedBagging;
pub use classifier::{argmax, class_weights, Classifier, ClassifierModel};
pub use encoder::{EncodedLabel, LabelEncoder};
pub use features::TfidfVectorizer;
pub use forest::RandomForest;
pub use metrics::{classification_report, top_confusions, weighted_f1};
pub use models::{
    AverageMetrics, ClassMetrics, ClassificationReport, ConfusionPair, ModelMetadata, ModelType,
    TreeParams,
};
pub use pipeline::{ColumnPipeline, PipelineSettings, TrainedModel, MODEL_FORMAT_VERSION};
pub use search::{Candidate, CandidateScore, GridSearch, SearchOutcome};
pub use voting::VotingEnsemble;
