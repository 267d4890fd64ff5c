use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{FeatureConfig, ModelConfig, PreprocessingConfig, SearchConfig};
use crate::dataset::record::LabelColumn;
use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, ClassifierModel};
use crate::ml::encoder::LabelEncoder;
use crate::ml::features::TfidfVectorizer;
use crate::ml::models::{ClassificationReport, ModelMetadata, TreeParams};
use crate::ml::search::{Candidate, GridSearch};

/// Bumped whenever the serialized layout of [`TrainedModel`] changes
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Settings a column pipeline is fit with
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub search: SearchConfig,
}

/// Fitted vectorizer, classifier and encoder for one label column
#[derive(Debug, Serialize, Deserialize)]
pub struct ColumnPipeline {
    column: LabelColumn,
    vectorizer: TfidfVectorizer,
    classifier: ClassifierModel,
    encoder: LabelEncoder,
    metadata: ModelMetadata,
    best_params: BTreeMap<String, String>,
    cv_score: Option<f64>,
}

impl ColumnPipeline {
    /// Fit on normalized texts and their encoded labels.
    ///
    /// With search enabled the grid winner is refit on all of `texts`.
    pub fn fit<S: AsRef<str> + Sync>(
        column: LabelColumn,
        texts: &[S],
        labels: &[usize],
        encoder: LabelEncoder,
        settings: &PipelineSettings,
    ) -> Result<Self> {
        let n_classes = encoder.n_classes();
        let base = Candidate {
            features: settings.features.clone(),
            params: TreeParams::from_config(&settings.model),
        };

        let (candidate, cv_score) = if settings.search.enabled {
            let search = GridSearch::new(
                settings.search.clone(),
                settings.model.kind,
                settings.model.voting_weights.clone(),
                base,
            );
            let outcome = search.run(texts, labels, n_classes)?;
            let score = (!outcome.scores.is_empty()).then_some(outcome.best_score);
            (outcome.best, score)
        } else {
            (base, None)
        };

        let mut vectorizer = TfidfVectorizer::new(candidate.features.clone());
        let features = vectorizer.fit_transform(texts)?;

        let mut classifier = ClassifierModel::build(
            settings.model.kind,
            candidate.params.clone(),
            &settings.model.voting_weights,
        );
        classifier.fit(&features, labels, n_classes)?;

        let best_params = candidate.to_map();
        let metadata = ModelMetadata {
            model_type: classifier.model_type(),
            trained_at: chrono::Utc::now(),
            n_training_samples: labels.len(),
            n_features: vectorizer.n_features(),
            n_classes,
            hyperparameters: best_params.clone(),
            validation_report: None,
        };

        info!(
            column = %column,
            model = %metadata.model_type,
            samples = metadata.n_training_samples,
            features = metadata.n_features,
            classes = n_classes,
            "Fitted column pipeline"
        );

        Ok(Self {
            column,
            vectorizer,
            classifier,
            encoder,
            metadata,
            best_params,
            cv_score,
        })
    }

    /// Class probabilities for normalized texts, columns ordered by class id
    pub fn predict_proba<S: AsRef<str>>(&self, texts: &[S]) -> Result<Array2<f64>> {
        let features = self.vectorizer.transform(texts)?;
        let proba = self.classifier.predict_proba(&features)?;

        if proba.ncols() != self.encoder.n_classes() {
            return Err(AppError::Model(format!(
                "classifier returned {} classes, encoder has {}",
                proba.ncols(),
                self.encoder.n_classes()
            )));
        }
        Ok(proba)
    }

    /// Predicted class ids
    pub fn predict<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<usize>> {
        let features = self.vectorizer.transform(texts)?;
        self.classifier.predict(&features)
    }

    pub fn column(&self) -> LabelColumn {
        self.column
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn best_params(&self) -> &BTreeMap<String, String> {
        &self.best_params
    }

    pub fn cv_score(&self) -> Option<f64> {
        self.cv_score
    }

    pub fn set_validation_report(&mut self, report: ClassificationReport) {
        self.metadata.validation_report = Some(report);
    }

    #[cfg(test)]
    pub(crate) fn with_encoder(mut self, encoder: LabelEncoder) -> Self {
        self.encoder = encoder;
        self
    }
}

/// Everything needed to classify raw text: both column pipelines plus the
/// normalization settings they were trained with
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedModel {
    format_version: u32,
    created_at: chrono::DateTime<chrono::Utc>,
    preprocessing: PreprocessingConfig,
    category: ColumnPipeline,
    sub_category: ColumnPipeline,
}

impl TrainedModel {
    pub fn new(
        preprocessing: PreprocessingConfig,
        category: ColumnPipeline,
        sub_category: ColumnPipeline,
    ) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            created_at: chrono::Utc::now(),
            preprocessing,
            category,
            sub_category,
        }
    }

    pub fn column(&self, column: LabelColumn) -> &ColumnPipeline {
        match column {
            LabelColumn::Category => &self.category,
            LabelColumn::SubCategory => &self.sub_category,
        }
    }

    pub fn column_mut(&mut self, column: LabelColumn) -> &mut ColumnPipeline {
        match column {
            LabelColumn::Category => &mut self.category,
            LabelColumn::SubCategory => &mut self.sub_category,
        }
    }

    pub fn preprocessing(&self) -> &PreprocessingConfig {
        &self.preprocessing
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: TrainedModel = bincode::deserialize(bytes)?;
        if model.format_version != MODEL_FORMAT_VERSION {
            return Err(AppError::Serialization(format!(
                "unsupported model format version {} (expected {})",
                model.format_version, MODEL_FORMAT_VERSION
            )));
        }
        Ok(model)
    }

    /// Write to a temporary sibling of `path` and rename it into place
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_bytes()?)?;
        info!(path = %path.display(), "Saved model");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            AppError::InputDefect(format!("cannot read model {}: {}", path.display(), e))
        })?;
        let model = Self::from_bytes(&bytes)?;
        debug!(path = %path.display(), created_at = %model.created_at, "Loaded model");
        Ok(model)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
    path.with_file_name(name)
}

/// Stage `bytes` next to `path`; the returned path is renamed by [`commit`]
pub(crate) fn stage_file(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(tmp)
}

pub(crate) fn commit(staged: &Path, path: &Path) -> Result<()> {
    fs::rename(staged, path).map_err(|e| {
        let _ = fs::remove_file(staged);
        AppError::Io(e)
    })
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let staged = stage_file(path, bytes)?;
    commit(&staged, path)
}
