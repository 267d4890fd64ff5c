//! Two-level classification of free-text crime reports.
//!
//! Reports are normalized into lemma strings, vectorized with TF-IDF n-grams
//! and classified into a category and a sub-category by tree ensembles.

pub mod config;
pub mod dataset;
pub mod error;
pub mod ml;
pub mod observability;
pub mod prediction;
pub mod text;
pub mod training;

pub use config::Config;
pub use error::{AppError, Result};
pub use prediction::{CrimePrediction, LabelPrediction, Predictor};
pub use training::{Trainer, TrainingOutcome, TrainingReport};
