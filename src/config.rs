use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::error::Result;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct Config {
    /// Dataset locations and column names
    #[serde(default)]
    #[validate(nested)]
    pub data: DataConfig,

    /// Text normalization
    #[serde(default)]
    #[validate(nested)]
    pub preprocessing: PreprocessingConfig,

    /// Rare class filtering
    #[serde(default)]
    #[validate(nested)]
    pub filtering: FilteringConfig,

    /// TF-IDF feature extraction
    #[serde(default)]
    #[validate(nested)]
    pub features: FeatureConfig,

    /// Classifier hyperparameters
    #[serde(default)]
    #[validate(nested)]
    pub model: ModelConfig,

    /// Hyperparameter search
    #[serde(default)]
    #[validate(nested)]
    pub search: SearchConfig,

    /// Train/validation split and evaluation
    #[serde(default)]
    #[validate(nested)]
    pub training: TrainingConfig,

    /// Inference thresholds
    #[serde(default)]
    #[validate(nested)]
    pub prediction: PredictionConfig,

    /// Artifact locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the built-in defaults, an optional file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| std::env::var("CRC_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/local.toml".to_string());

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: CRC_)
            .add_source(
                config::Environment::with_prefix("CRC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DataConfig {
    /// Training dataset (CSV)
    #[serde(default = "default_train_path")]
    pub train_path: PathBuf,

    /// Held-out test dataset (CSV); a stratified split is used when absent
    #[serde(default)]
    pub test_path: Option<PathBuf>,

    /// Free-text column
    #[serde(default = "default_text_column")]
    #[validate(length(min = 1))]
    pub text_column: String,

    /// Category label column
    #[serde(default = "default_category_column")]
    #[validate(length(min = 1))]
    pub category_column: String,

    /// Sub-category label column
    #[serde(default = "default_sub_category_column")]
    #[validate(length(min = 1))]
    pub sub_category_column: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_path: default_train_path(),
            test_path: None,
            text_column: default_text_column(),
            category_column: default_category_column(),
            sub_category_column: default_sub_category_column(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PreprocessingConfig {
    /// Stopwords added on top of the English and domain lists
    #[serde(default)]
    pub extra_stopwords: Vec<String>,

    /// Tokens shorter than this are dropped
    #[serde(default = "default_min_token_length")]
    #[validate(range(min = 1))]
    pub min_token_length: usize,

    /// Texts with fewer surviving lemmas normalize to empty
    #[serde(default = "default_min_tokens")]
    #[validate(range(min = 1))]
    pub min_tokens: usize,

    /// Append bigram/trigram tokens built from adjacent lemmas
    #[serde(default = "default_true")]
    pub ngram_augmentation: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            extra_stopwords: Vec::new(),
            min_token_length: default_min_token_length(),
            min_tokens: default_min_tokens(),
            ngram_augmentation: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FilteringConfig {
    /// Minimum support a class needs to be kept
    #[serde(default = "default_min_samples_per_class")]
    #[validate(range(min = 1))]
    pub min_samples_per_class: usize,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            min_samples_per_class: default_min_samples_per_class(),
        }
    }
}

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FeatureConfig {
    /// Maximum vocabulary size
    #[serde(default = "default_max_features")]
    #[validate(range(min = 1))]
    pub max_features: usize,

    /// N-gram range (min, max)
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),

    /// Minimum number of documents a term must appear in
    #[serde(default = "default_min_df")]
    pub min_df: usize,

    /// Maximum fraction of documents a term may appear in
    #[serde(default = "default_max_df")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_df: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            ngram_range: default_ngram_range(),
            min_df: default_min_df(),
            max_df: default_max_df(),
        }
    }
}

/// Classifier family used per label column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    RandomForest,
    BalancedBagging,
    Voting,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ModelConfig {
    /// Classifier family
    #[serde(default)]
    pub kind: ModelKind,

    /// Trees per ensemble
    #[serde(default = "default_n_estimators")]
    #[validate(range(min = 1))]
    pub n_estimators: usize,

    /// Maximum tree depth (0 means unlimited)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Minimum samples required to split a node
    #[serde(default = "default_min_samples_split")]
    #[validate(range(min = 2))]
    pub min_samples_split: usize,

    /// Minimum samples per leaf
    #[serde(default = "default_min_samples_leaf")]
    #[validate(range(min = 1))]
    pub min_samples_leaf: usize,

    /// Fraction of feature columns each tree sees
    #[serde(default = "default_feature_fraction")]
    #[validate(range(min = 0.01, max = 1.0))]
    pub feature_fraction: f64,

    /// Weight samples inversely to class frequency
    #[serde(default = "default_true")]
    pub class_weighting: bool,

    /// Soft-voting weights (random forest, balanced bagging)
    #[serde(default = "default_voting_weights")]
    pub voting_weights: Vec<f64>,

    /// Random seed
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::default(),
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            feature_fraction: default_feature_fraction(),
            class_weighting: true,
            voting_weights: default_voting_weights(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchConfig {
    /// Run exhaustive grid search before the final fit
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cross-validation folds
    #[serde(default = "default_cv_folds")]
    #[validate(range(min = 2))]
    pub cv_folds: usize,

    #[serde(default = "default_grid_n_estimators")]
    #[validate(length(min = 1))]
    pub n_estimators: Vec<usize>,

    /// 0 means unlimited depth
    #[serde(default = "default_grid_max_depth")]
    #[validate(length(min = 1))]
    pub max_depth: Vec<usize>,

    #[serde(default = "default_grid_min_samples_split")]
    #[validate(length(min = 1))]
    pub min_samples_split: Vec<usize>,

    #[serde(default = "default_grid_max_features")]
    #[validate(length(min = 1))]
    pub max_features: Vec<usize>,

    #[serde(default = "default_grid_ngram_ranges")]
    #[validate(length(min = 1))]
    pub ngram_ranges: Vec<(usize, usize)>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cv_folds: default_cv_folds(),
            n_estimators: default_grid_n_estimators(),
            max_depth: default_grid_max_depth(),
            min_samples_split: default_grid_min_samples_split(),
            max_features: default_grid_max_features(),
            ngram_ranges: default_grid_ngram_ranges(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrainingConfig {
    /// Validation fraction when no test dataset is given
    #[serde(default = "default_test_size")]
    #[validate(range(min = 0.05, max = 0.5))]
    pub test_size: f64,

    /// Seed for the stratified split
    #[serde(default = "default_seed")]
    pub random_state: u64,

    /// Confusion pairs kept by error analysis
    #[serde(default = "default_top_confusions")]
    pub top_confusions: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            random_state: default_seed(),
            top_confusions: default_top_confusions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PredictionConfig {
    /// Below this probability the label is reported as Unknown
    #[serde(default = "default_confidence_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Serialized model bundle
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Training metrics report (JSON)
    #[serde(default = "default_metrics_path")]
    pub metrics_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            metrics_path: default_metrics_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
        }
    }
}

// Default value functions
fn default_train_path() -> PathBuf {
    PathBuf::from("data/train.csv")
}

fn default_text_column() -> String {
    "crimeaditionalinfo".to_string()
}

fn default_category_column() -> String {
    "category".to_string()
}

fn default_sub_category_column() -> String {
    "sub_category".to_string()
}

fn default_min_token_length() -> usize {
    3
}

fn default_min_tokens() -> usize {
    3
}

fn default_min_samples_per_class() -> usize {
    2
}

fn default_max_features() -> usize {
    10000
}

fn default_ngram_range() -> (usize, usize) {
    (1, 3)
}

fn default_min_df() -> usize {
    2
}

fn default_max_df() -> f64 {
    0.95
}

fn default_n_estimators() -> usize {
    200
}

fn default_max_depth() -> usize {
    20
}

fn default_min_samples_split() -> usize {
    5
}

fn default_min_samples_leaf() -> usize {
    2
}

fn default_feature_fraction() -> f64 {
    0.7
}

fn default_voting_weights() -> Vec<f64> {
    vec![1.0, 1.0]
}

fn default_seed() -> u64 {
    42
}

fn default_cv_folds() -> usize {
    5
}

fn default_grid_n_estimators() -> Vec<usize> {
    vec![100, 200]
}

fn default_grid_max_depth() -> Vec<usize> {
    vec![10, 20, 0]
}

fn default_grid_min_samples_split() -> Vec<usize> {
    vec![2, 5]
}

fn default_grid_max_features() -> Vec<usize> {
    vec![5000, 10000]
}

fn default_grid_ngram_ranges() -> Vec<(usize, usize)> {
    vec![(1, 2), (1, 3)]
}

fn default_test_size() -> f64 {
    0.2
}

fn default_top_confusions() -> usize {
    5
}

fn default_confidence_threshold() -> f64 {
    0.3
}

fn default_model_path() -> PathBuf {
    PathBuf::from("artifacts/model.bin")
}

fn default_metrics_path() -> PathBuf {
    PathBuf::from("artifacts/metrics.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "crime-report-classifier".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_min_samples_per_class(), 2);
        assert_eq!(default_confidence_threshold(), 0.3);
        assert_eq!(default_ngram_range(), (1, 3));
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
    }

    #[test]
    fn test_model_kind_default() {
        assert_eq!(ModelKind::default(), ModelKind::RandomForest);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = Config::default();
        config.prediction.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_embedded_defaults() {
        let config = Config::load(Some(Path::new("does/not/exist.toml"))).unwrap();
        assert_eq!(config.data.text_column, "crimeaditionalinfo");
        assert_eq!(config.filtering.min_samples_per_class, 2);
        assert_eq!(config.features.max_features, 10000);
        assert_eq!(config.search.ngram_ranges, vec![(1, 2), (1, 3)]);
        assert!(config.preprocessing.ngram_augmentation);
    }
}
