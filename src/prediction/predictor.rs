use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PredictionConfig;
use crate::dataset::LabelColumn;
use crate::error::{AppError, Result};
use crate::ml::{argmax, TrainedModel};
use crate::text::TextNormalizer;

/// Label emitted when the model is unsure or inference failed
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Label and probability for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPrediction {
    pub label: String,
    pub confidence: f64,
}

impl LabelPrediction {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Predicted category and sub-category of one report.
///
/// Serializes flat as `category`, `category_confidence`, `sub_category`,
/// `sub_category_confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FlatPrediction", into = "FlatPrediction")]
pub struct CrimePrediction {
    pub category: LabelPrediction,
    pub sub_category: LabelPrediction,
}

impl CrimePrediction {
    pub fn unknown() -> Self {
        Self {
            category: LabelPrediction::unknown(),
            sub_category: LabelPrediction::unknown(),
        }
    }

    pub fn get(&self, column: LabelColumn) -> &LabelPrediction {
        match column {
            LabelColumn::Category => &self.category,
            LabelColumn::SubCategory => &self.sub_category,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FlatPrediction {
    category: String,
    category_confidence: f64,
    sub_category: String,
    sub_category_confidence: f64,
}

impl From<CrimePrediction> for FlatPrediction {
    fn from(p: CrimePrediction) -> Self {
        Self {
            category: p.category.label,
            category_confidence: p.category.confidence,
            sub_category: p.sub_category.label,
            sub_category_confidence: p.sub_category.confidence,
        }
    }
}

impl From<FlatPrediction> for CrimePrediction {
    fn from(f: FlatPrediction) -> Self {
        Self {
            category: LabelPrediction {
                label: f.category,
                confidence: f.category_confidence,
            },
            sub_category: LabelPrediction {
                label: f.sub_category,
                confidence: f.sub_category_confidence,
            },
        }
    }
}

/// Classifies raw report text with a trained model.
///
/// Never fails: low confidence and per-column errors become `Unknown`.
pub struct Predictor {
    model: TrainedModel,
    normalizer: TextNormalizer,
    confidence_threshold: f64,
}

impl Predictor {
    /// Normalization uses the settings the model was trained with
    pub fn new(model: TrainedModel, config: &PredictionConfig) -> Self {
        let normalizer = TextNormalizer::new(model.preprocessing());
        Self {
            model,
            normalizer,
            confidence_threshold: config.confidence_threshold,
        }
    }

    pub fn load(path: &Path, config: &PredictionConfig) -> Result<Self> {
        Ok(Self::new(TrainedModel::load(path)?, config))
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Predict both columns for one raw text
    pub fn predict(&self, text: &str) -> CrimePrediction {
        let normalized = self.normalizer.normalize_or_empty(text);
        if normalized.is_empty() {
            debug!("Empty normalized text, predicting Unknown");
            return CrimePrediction::unknown();
        }

        let column = |column: LabelColumn| {
            self.predict_column(&normalized, column).unwrap_or_else(|e| {
                warn!(column = %column, error = %e, "Column prediction failed, using Unknown");
                LabelPrediction::unknown()
            })
        };

        CrimePrediction {
            category: column(LabelColumn::Category),
            sub_category: column(LabelColumn::SubCategory),
        }
    }

    /// Predict one column from already-normalized text
    pub fn predict_column(&self, normalized: &str, column: LabelColumn) -> Result<LabelPrediction> {
        let pipeline = self.model.column(column);
        let proba = pipeline.predict_proba(&[normalized])?;
        let row = proba.rows().into_iter().next().ok_or_else(|| {
            AppError::Prediction(format!("no probabilities returned for {}", column))
        })?;

        let (class_id, confidence) = argmax(row);
        if confidence.is_nan() || confidence < self.confidence_threshold {
            return Ok(LabelPrediction::unknown());
        }

        let label = pipeline
            .encoder()
            .decode(class_id)
            .map_err(|e| AppError::Prediction(e.to_string()))?;

        Ok(LabelPrediction {
            label: label.to_string(),
            confidence,
        })
    }

    /// Predict many texts in parallel, preserving order
    pub fn predict_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<CrimePrediction> {
        texts.par_iter().map(|t| self.predict(t.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        FeatureConfig, ModelConfig, ModelKind, PreprocessingConfig, SearchConfig,
    };
    use crate::ml::{ColumnPipeline, LabelEncoder, PipelineSettings};

    const FRAUD_TEXT: &str = "Money debited through upi payment fraud transaction";
    const HACKING_TEXT: &str = "Hacker changed email password and profile login";

    fn settings() -> PipelineSettings {
        PipelineSettings {
            features: FeatureConfig {
                max_features: 200,
                ngram_range: (1, 1),
                min_df: 1,
                max_df: 1.0,
            },
            model: ModelConfig {
                kind: ModelKind::RandomForest,
                n_estimators: 10,
                max_depth: 6,
                min_samples_split: 2,
                min_samples_leaf: 1,
                ..ModelConfig::default()
            },
            search: SearchConfig {
                enabled: false,
                ..SearchConfig::default()
            },
        }
    }

    fn column_pipeline(column: LabelColumn, names: [&str; 2]) -> ColumnPipeline {
        let normalizer = TextNormalizer::new(&PreprocessingConfig::default());
        let mut texts = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..6 {
            texts.push(normalizer.normalize(FRAUD_TEXT));
            labels.push(names[0]);
            texts.push(normalizer.normalize(HACKING_TEXT));
            labels.push(names[1]);
        }
        let encoder = LabelEncoder::fit(labels.iter());
        let ids = encoder.encode_all(&labels).unwrap();
        ColumnPipeline::fit(column, &texts, &ids, encoder, &settings()).unwrap()
    }

    #[test]
    fn test_failing_column_degrades_alone() {
        let category = column_pipeline(LabelColumn::Category, ["Fraud", "Hacking"]);
        // Three encoder classes against a two-class forest
        let sub_category = column_pipeline(LabelColumn::SubCategory, ["UPI", "Email"])
            .with_encoder(LabelEncoder::fit(["Email", "Other", "UPI"].iter()));
        let model = TrainedModel::new(PreprocessingConfig::default(), category, sub_category);
        let predictor = Predictor::new(model, &PredictionConfig::default());

        assert!(predictor
            .predict_column(&predictor.normalizer.normalize(FRAUD_TEXT), LabelColumn::SubCategory)
            .is_err());

        let prediction = predictor.predict(FRAUD_TEXT);
        assert_eq!(prediction.category.label, "Fraud");
        assert!(prediction.category.confidence >= 0.3);
        assert!(prediction.sub_category.is_unknown());
        assert_eq!(prediction.sub_category.confidence, 0.0);
    }

    #[test]
    fn test_flat_serialization() {
        let prediction = CrimePrediction {
            category: LabelPrediction {
                label: "Online Financial Fraud".to_string(),
                confidence: 0.8,
            },
            sub_category: LabelPrediction::unknown(),
        };

        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["category"], "Online Financial Fraud");
        assert_eq!(json["category_confidence"], 0.8);
        assert_eq!(json["sub_category"], "Unknown");
        assert_eq!(json["sub_category_confidence"], 0.0);

        let back: CrimePrediction = serde_json::from_value(json).unwrap();
        assert_eq!(back, prediction);
    }

    #[test]
    fn test_unknown_prediction() {
        let unknown = CrimePrediction::unknown();
        for column in LabelColumn::ALL {
            assert!(unknown.get(column).is_unknown());
            assert_eq!(unknown.get(column).confidence, 0.0);
        }
    }
}
