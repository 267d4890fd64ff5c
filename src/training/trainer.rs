use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::dataset::{
    class_counts, filter_rare_classes_joint, load_csv, stratified_split, ClassDistribution,
    Dataset, DatasetSchema, LabelColumn, Labeled, PreparedRecord, Record,
};
use crate::error::{AppError, Result};
use crate::ml::pipeline::{commit, stage_file};
use crate::ml::{
    classification_report, top_confusions, ColumnPipeline, EncodedLabel, LabelEncoder,
    PipelineSettings, TrainedModel,
};
use crate::text::TextNormalizer;
use crate::training::report::{ColumnReport, StageShape, TrainingReport};
use crate::training::stage::{StageTracker, TrainingStage};

/// Fewest filtered records a run can train and evaluate on
const MIN_TRAINING_RECORDS: usize = 2;

/// Texts and encoded labels of one column, split for fitting and evaluation
#[derive(Debug, Clone, Default)]
struct ColumnSplit {
    train_texts: Vec<String>,
    train_labels: Vec<usize>,
    validation_texts: Vec<String>,
    validation_labels: Vec<usize>,
}

impl ColumnSplit {
    fn push_train(&mut self, text: &str, label: usize) {
        self.train_texts.push(text.to_string());
        self.train_labels.push(label);
    }

    fn push_validation(&mut self, text: &str, label: usize) {
        self.validation_texts.push(text.to_string());
        self.validation_labels.push(label);
    }
}

/// Fitted model plus the metrics describing how it was obtained
#[derive(Debug)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub report: TrainingReport,
}

/// Drives one training run through every [`TrainingStage`].
///
/// A trainer is single-use: once persisted it cannot run again.
pub struct Trainer {
    config: Config,
    normalizer: TextNormalizer,
    tracker: StageTracker,
}

impl Trainer {
    pub fn new(config: Config) -> Self {
        let normalizer = TextNormalizer::new(&config.preprocessing);
        Self {
            config,
            normalizer,
            tracker: StageTracker::new(),
        }
    }

    pub fn stage(&self) -> TrainingStage {
        self.tracker.current()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the configured datasets, train, and persist both artifacts
    pub fn run(&mut self) -> Result<TrainingOutcome> {
        let schema = DatasetSchema::from_config(&self.config.data);
        let train = load_csv(&self.config.data.train_path, &schema)?;
        let test = match &self.config.data.test_path {
            Some(path) => Some(load_csv(path, &schema)?),
            None => None,
        };

        let outcome = self.train(train, test)?;
        let output = self.config.output.clone();
        self.persist(&outcome, &output.model_path, &output.metrics_path)?;
        Ok(outcome)
    }

    /// Run every stage up to and including evaluation.
    ///
    /// With `test` given it is cleaned like the training data and used for
    /// evaluation; otherwise each column gets a stratified validation split.
    pub fn train(&mut self, train: Dataset, test: Option<Dataset>) -> Result<TrainingOutcome> {
        let started_at = chrono::Utc::now();
        let timer = Instant::now();
        let run_id = Uuid::new_v4();
        let min_samples = self.config.filtering.min_samples_per_class;

        info!(%run_id, records = train.len(), "Starting training run");
        let mut stages = vec![StageShape {
            stage: TrainingStage::Raw,
            records: train.len(),
        }];

        // Cleaned
        let cleaned = self.clean(train);
        self.tracker.advance(TrainingStage::Cleaned)?;
        stages.push(StageShape {
            stage: TrainingStage::Cleaned,
            records: cleaned.len(),
        });

        // Filtered
        let raw_distributions: Vec<ClassDistribution> = LabelColumn::ALL
            .iter()
            .map(|&column| ClassDistribution::analyze(&cleaned, column, min_samples))
            .collect();
        raw_distributions.iter().for_each(ClassDistribution::log);

        let filtered = filter_rare_classes_joint(cleaned, min_samples)?;
        if filtered.len() < MIN_TRAINING_RECORDS {
            return Err(AppError::InsufficientData(format!(
                "{} records remain after filtering with min_samples_per_class = {}; at least {} are required",
                filtered.len(),
                min_samples,
                MIN_TRAINING_RECORDS
            )));
        }
        for column in LabelColumn::ALL {
            ClassDistribution::analyze(&filtered, column, min_samples).log();
        }
        self.tracker.advance(TrainingStage::Filtered)?;
        stages.push(StageShape {
            stage: TrainingStage::Filtered,
            records: filtered.len(),
        });

        // Encoded
        let encoders: Vec<LabelEncoder> = LabelColumn::ALL
            .iter()
            .map(|&column| LabelEncoder::fit(filtered.labels(column)))
            .collect();
        self.tracker.advance(TrainingStage::Encoded)?;

        // Split
        let (splits, dropped_unseen_test_rows) = match test {
            Some(test) => self.split_with_test(&filtered, test, &encoders)?,
            None => (self.split_stratified(&filtered, &encoders)?, 0),
        };
        self.tracker.advance(TrainingStage::Split)?;

        // Fitted
        let settings = PipelineSettings {
            features: self.config.features.clone(),
            model: self.config.model.clone(),
            search: self.config.search.clone(),
        };
        let mut pipelines = Vec::with_capacity(LabelColumn::ALL.len());
        for (idx, &column) in LabelColumn::ALL.iter().enumerate() {
            let split = &splits[idx];
            let pipeline = ColumnPipeline::fit(
                column,
                &split.train_texts,
                &split.train_labels,
                encoders[idx].clone(),
                &settings,
            )?;
            pipelines.push(pipeline);
        }
        self.tracker.advance(TrainingStage::Fitted)?;

        // Evaluated
        let mut column_reports = Vec::with_capacity(pipelines.len());
        for (idx, &column) in LabelColumn::ALL.iter().enumerate() {
            let split = &splits[idx];
            let pipeline = &mut pipelines[idx];
            let classes = pipeline.encoder().classes().to_vec();

            let (validation, confusions) = if split.validation_texts.is_empty() {
                warn!(column = %column, "No validation rows, skipping evaluation");
                (None, Vec::new())
            } else {
                let predicted = pipeline.predict(&split.validation_texts)?;
                let report = classification_report(&split.validation_labels, &predicted, &classes);
                let confusions = top_confusions(
                    &split.validation_labels,
                    &predicted,
                    &classes,
                    self.config.training.top_confusions,
                );
                info!(
                    column = %column,
                    accuracy = report.accuracy,
                    weighted_f1 = report.weighted_avg.f1_score,
                    macro_f1 = report.macro_avg.f1_score,
                    "Evaluated column"
                );
                pipeline.set_validation_report(report.clone());
                (Some(report), confusions)
            };

            column_reports.push(ColumnReport {
                column,
                n_classes: pipeline.encoder().n_classes(),
                class_counts: class_counts(&filtered, column),
                raw_distribution: raw_distributions[idx].clone(),
                train_records: split.train_texts.len(),
                validation_records: split.validation_texts.len(),
                best_params: pipeline.best_params().clone(),
                cv_score: pipeline.cv_score(),
                validation,
                top_confusions: confusions,
            });
        }
        self.tracker.advance(TrainingStage::Evaluated)?;

        let sub_category = pipelines.pop();
        let category = pipelines.pop();
        let (category, sub_category) = category.zip(sub_category).ok_or_else(|| {
            AppError::Internal("expected one pipeline per label column".to_string())
        })?;
        let model_type = category.metadata().model_type;
        let model = TrainedModel::new(self.config.preprocessing.clone(), category, sub_category);

        let report = TrainingReport {
            run_id,
            started_at,
            elapsed_seconds: timer.elapsed().as_secs_f64(),
            model_type,
            stages,
            dropped_unseen_test_rows,
            columns: column_reports,
        };

        info!(
            %run_id,
            elapsed_seconds = report.elapsed_seconds,
            "Training finished"
        );

        Ok(TrainingOutcome { model, report })
    }

    /// Write the model bundle and metrics report; neither appears unless both are written
    pub fn persist(
        &mut self,
        outcome: &TrainingOutcome,
        model_path: &Path,
        metrics_path: &Path,
    ) -> Result<()> {
        if self.tracker.current() != TrainingStage::Evaluated {
            return Err(AppError::InvalidStateTransition(format!(
                "cannot persist from stage {}",
                self.tracker.current()
            )));
        }

        let model_bytes = outcome.model.to_bytes()?;
        let report_json = outcome.report.to_json()?;

        let staged_model = stage_file(model_path, &model_bytes)?;
        let staged_report = match stage_file(metrics_path, report_json.as_bytes()) {
            Ok(path) => path,
            Err(e) => {
                let _ = std::fs::remove_file(&staged_model);
                return Err(e);
            }
        };

        // An existing bundle is set aside so a failed report commit can restore it
        let previous_model = if model_path.exists() {
            let backup = model_path.with_extension(format!("{}.bak", Uuid::new_v4()));
            if let Err(e) = std::fs::rename(model_path, &backup) {
                let _ = std::fs::remove_file(&staged_model);
                let _ = std::fs::remove_file(&staged_report);
                return Err(e.into());
            }
            Some(backup)
        } else {
            None
        };

        let committed = commit(&staged_model, model_path)
            .and_then(|()| commit(&staged_report, metrics_path));
        if let Err(e) = committed {
            let _ = std::fs::remove_file(&staged_model);
            let _ = std::fs::remove_file(&staged_report);
            let _ = std::fs::remove_file(model_path);
            if let Some(backup) = &previous_model {
                let _ = std::fs::rename(backup, model_path);
            }
            warn!(error = %e, "Persisting artifacts failed, previous model kept");
            return Err(e);
        }
        if let Some(backup) = previous_model {
            let _ = std::fs::remove_file(backup);
        }

        self.tracker.advance(TrainingStage::Persisted)?;
        info!(
            model = %model_path.display(),
            metrics = %metrics_path.display(),
            "Persisted training artifacts"
        );
        Ok(())
    }

    /// Drop unlabeled records and records whose text normalizes to nothing
    fn clean(&self, dataset: Dataset) -> Dataset<PreparedRecord> {
        let total = dataset.len();
        let labeled = dataset.retain(Record::has_labels);
        let unlabeled = total - labeled.len();

        let prepared: Vec<PreparedRecord> = labeled
            .into_records()
            .into_par_iter()
            .map(|record| {
                let normalized_text = self.normalizer.normalize_or_empty(record.text.as_str());
                PreparedRecord {
                    record,
                    normalized_text,
                }
            })
            .collect();

        let prepared: Dataset<PreparedRecord> = prepared.into_iter().collect();
        let before = prepared.len();
        let cleaned = prepared.retain(|r| !r.normalized_text.is_empty());

        info!(
            unlabeled,
            empty_text = before - cleaned.len(),
            remaining = cleaned.len(),
            "Cleaned dataset"
        );
        cleaned
    }

    fn split_stratified(
        &self,
        dataset: &Dataset<PreparedRecord>,
        encoders: &[LabelEncoder],
    ) -> Result<Vec<ColumnSplit>> {
        let mut splits = Vec::with_capacity(encoders.len());

        for (column, encoder) in LabelColumn::ALL.iter().zip(encoders) {
            let labels = encoder.encode_all(&dataset.labels(*column))?;
            let indices = stratified_split(
                &labels,
                self.config.training.test_size,
                self.config.training.random_state,
            );

            let mut split = ColumnSplit::default();
            for &idx in &indices.train {
                split.push_train(&dataset.records()[idx].normalized_text, labels[idx]);
            }
            for &idx in &indices.validation {
                split.push_validation(&dataset.records()[idx].normalized_text, labels[idx]);
            }

            info!(
                column = %column,
                train = split.train_texts.len(),
                validation = split.validation_texts.len(),
                "Stratified split"
            );
            splits.push(split);
        }

        Ok(splits)
    }

    fn split_with_test(
        &self,
        train: &Dataset<PreparedRecord>,
        test: Dataset,
        encoders: &[LabelEncoder],
    ) -> Result<(Vec<ColumnSplit>, usize)> {
        let test = self.clean(test);
        let mut splits = vec![ColumnSplit::default(); encoders.len()];

        for (idx, column) in LabelColumn::ALL.iter().enumerate() {
            let labels = encoders[idx].encode_all(&train.labels(*column))?;
            for (record, label) in train.iter().zip(labels) {
                splits[idx].push_train(&record.normalized_text, label);
            }
        }

        let mut dropped = 0;
        for record in test.iter() {
            let lookups: Vec<EncodedLabel> = LabelColumn::ALL
                .iter()
                .zip(encoders)
                .map(|(&column, encoder)| encoder.lookup(record.label(column)))
                .collect();

            if lookups.iter().any(|l| *l == EncodedLabel::Unknown) {
                dropped += 1;
                continue;
            }
            for (idx, lookup) in lookups.into_iter().enumerate() {
                if let EncodedLabel::Known(label) = lookup {
                    splits[idx].push_validation(&record.normalized_text, label);
                }
            }
        }

        if dropped > 0 {
            warn!(dropped, "Dropped test rows with labels unseen in training");
        }
        info!(
            train = train.len(),
            test = test.len() - dropped,
            "Using held-out test set"
        );

        Ok((splits, dropped))
    }
}
