/// Inference over trained models
///
/// - Per-column label and confidence with an `Unknown` fallback
/// - Single and batch prediction

pub mod predictor;

pub use predictor::{CrimePrediction, LabelPrediction, Predictor, UNKNOWN_LABEL};
