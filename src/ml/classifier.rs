use crate::config::{ModelConfig, ModelKind};
use crate::error::{AppError, Result};
use crate::ml::bagging::BalancedBagging;
use crate::ml::forest::RandomForest;
use crate::ml::models::{ModelType, TreeParams};
use crate::ml::voting::VotingEnsemble;
use ndarray::{Array2, ArrayView1};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Trait for classifiers
pub trait Classifier: Send + Sync {
    /// Fit on a feature matrix and dense class ids in `0..n_classes`
    fn fit(&mut self, features: &Array2<f64>, labels: &[usize], n_classes: usize) -> Result<()>;

    /// Per-class probabilities, one row per sample and one column per class
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predict class ids (arg-max of the probabilities)
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(features)?;
        Ok(proba.rows().into_iter().map(|row| argmax(row).0).collect())
    }

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// Index and value of the largest entry; ties go to the lowest index
pub fn argmax(row: ArrayView1<'_, f64>) -> (usize, f64) {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (idx, &value)| {
            if value > best.1 {
                (idx, value)
            } else {
                best
            }
        })
}

/// Balanced class weights: `n_samples / (n_present * count(class))`.
///
/// All ones when fewer than two classes are present; absent classes get 0.
pub fn class_weights(labels: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &label in labels {
        if label < n_classes {
            counts[label] += 1;
        }
    }

    let present = counts.iter().filter(|&&c| c > 0).count();
    if present < 2 {
        return vec![1.0; n_classes];
    }

    let n_samples = labels.len() as f64;
    counts
        .into_iter()
        .map(|count| {
            if count == 0 {
                0.0
            } else {
                n_samples / (present as f64 * count as f64)
            }
        })
        .collect()
}

/// The single class present in `labels`, if only one is
pub(crate) fn single_class(labels: &[usize]) -> Option<usize> {
    let first = *labels.first()?;
    labels.iter().all(|&l| l == first).then_some(first)
}

/// Random sorted subset of feature columns, at least one
pub(crate) fn sample_features<R: Rng>(n_features: usize, fraction: f64, rng: &mut R) -> Vec<usize> {
    let amount = ((n_features as f64 * fraction).ceil() as usize).clamp(1, n_features.max(1));
    if amount >= n_features {
        return (0..n_features).collect();
    }

    let mut columns = index::sample(rng, n_features, amount).into_vec();
    columns.sort_unstable();
    columns
}

pub(crate) fn check_training_input(
    features: &Array2<f64>,
    labels: &[usize],
    n_classes: usize,
) -> Result<()> {
    if features.nrows() == 0 {
        return Err(AppError::InsufficientData(
            "cannot fit a classifier on zero samples".to_string(),
        ));
    }
    if features.nrows() != labels.len() {
        return Err(AppError::Model(format!(
            "feature rows ({}) and labels ({}) differ in length",
            features.nrows(),
            labels.len()
        )));
    }
    if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
        return Err(AppError::Model(format!(
            "label id {} out of range for {} classes",
            bad, n_classes
        )));
    }
    Ok(())
}

/// Serializable dispatch over the available classifier families
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierModel {
    RandomForest(RandomForest),
    BalancedBagging(BalancedBagging),
    Voting(VotingEnsemble),
}

impl ClassifierModel {
    /// Unfitted classifier of the configured family
    pub fn build(kind: ModelKind, params: TreeParams, voting_weights: &[f64]) -> Self {
        match kind {
            ModelKind::RandomForest => ClassifierModel::RandomForest(RandomForest::new(params)),
            ModelKind::BalancedBagging => {
                ClassifierModel::BalancedBagging(BalancedBagging::new(params))
            }
            ModelKind::Voting => {
                let weight = |idx: usize| voting_weights.get(idx).copied().unwrap_or(1.0);
                ClassifierModel::Voting(VotingEnsemble::new(vec![
                    (
                        ClassifierModel::RandomForest(RandomForest::new(params.clone())),
                        weight(0),
                    ),
                    (
                        ClassifierModel::BalancedBagging(BalancedBagging::new(params)),
                        weight(1),
                    ),
                ]))
            }
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::build(
            config.kind,
            TreeParams::from_config(config),
            &config.voting_weights,
        )
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ClassifierModel::RandomForest(model) => model,
            ClassifierModel::BalancedBagging(model) => model,
            ClassifierModel::Voting(model) => model,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            ClassifierModel::RandomForest(model) => model,
            ClassifierModel::BalancedBagging(model) => model,
            ClassifierModel::Voting(model) => model,
        }
    }
}

impl Classifier for ClassifierModel {
    fn fit(&mut self, features: &Array2<f64>, labels: &[usize], n_classes: usize) -> Result<()> {
        self.inner_mut().fit(features, labels, n_classes)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(features)
    }

    fn model_type(&self) -> ModelType {
        self.inner().model_type()
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }
}
