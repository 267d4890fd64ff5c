use crate::error::{AppError, Result};
use crate::ml::classifier::{check_training_input, single_class, Classifier};
use crate::ml::models::{ModelType, TreeParams};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use std::collections::BTreeMap;
use tracing::debug;

type EntropyTree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// A bagged member; a resample holding one class needs no tree
#[derive(Debug, Serialize, Deserialize)]
enum BaggedTree {
    Constant(usize),
    Tree(EntropyTree),
}

/// Bagging of entropy trees, each fit on a class-balanced bootstrap resample
#[derive(Debug, Serialize, Deserialize)]
pub struct BalancedBagging {
    /// Hyperparameters
    params: TreeParams,

    /// Fitted members
    trees: Vec<BaggedTree>,

    /// Number of classes
    n_classes: usize,

    /// Number of feature columns seen at fit time
    n_features: usize,

    /// Is trained
    trained: bool,
}

impl BalancedBagging {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_classes: 0,
            n_features: 0,
            trained: false,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
        let shape = arr.shape();
        let data: Vec<f64> = arr.iter().copied().collect();
        DenseMatrix::new(shape[0], shape[1], data, false)
    }

    fn fit_tree(&self, features: &Array2<f64>, labels: &[usize], tree_idx: usize) -> Result<BaggedTree> {
        let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(tree_idx as u64));
        let rows = balanced_resample(labels, &mut rng);

        let y: Vec<usize> = rows.iter().map(|&r| labels[r]).collect();
        if let Some(class) = single_class(&y) {
            return Ok(BaggedTree::Constant(class));
        }

        let x = Self::ndarray_to_densematrix(&features.select(Axis(0), &rows));
        let y: Vec<i32> = y.into_iter().map(|label| label as i32).collect();

        let mut params = DecisionTreeClassifierParameters::default()
            .with_criterion(SplitCriterion::Entropy)
            .with_min_samples_split(self.params.min_samples_split)
            .with_min_samples_leaf(self.params.min_samples_leaf);
        if let Some(depth) = self.params.max_depth {
            params = params.with_max_depth(depth.min(u16::MAX as usize) as u16);
        }

        let tree = DecisionTreeClassifier::fit(&x, &y, params).map_err(|e| {
            AppError::Model(format!("Failed to fit bagged tree {}: {}", tree_idx, e))
        })?;

        Ok(BaggedTree::Tree(tree))
    }
}

/// Undersample every class to the minority count, drawing with replacement
fn balanced_resample<R: Rng>(labels: &[usize], rng: &mut R) -> Vec<usize> {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(idx);
    }

    let per_class = by_class.values().map(Vec::len).min().unwrap_or(0);
    let mut rows = Vec::with_capacity(per_class * by_class.len());
    for indices in by_class.values() {
        for _ in 0..per_class {
            rows.push(indices[rng.gen_range(0..indices.len())]);
        }
    }
    rows
}

impl Classifier for BalancedBagging {
    fn fit(&mut self, features: &Array2<f64>, labels: &[usize], n_classes: usize) -> Result<()> {
        check_training_input(features, labels, n_classes)?;

        self.n_classes = n_classes;
        self.n_features = features.ncols();

        self.trees = if let Some(class) = single_class(labels) {
            vec![BaggedTree::Constant(class)]
        } else {
            (0..self.params.n_estimators)
                .into_par_iter()
                .map(|idx| self.fit_tree(features, labels, idx))
                .collect::<Result<Vec<_>>>()?
        };

        debug!(
            trees = self.trees.len(),
            n_classes,
            n_samples = labels.len(),
            "Fitted balanced bagging"
        );

        self.trained = true;
        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.trained {
            return Err(AppError::Model("Balanced bagging not trained".to_string()));
        }
        if features.ncols() != self.n_features {
            return Err(AppError::Model(format!(
                "expected {} feature columns, got {}",
                self.n_features,
                features.ncols()
            )));
        }

        let n_samples = features.nrows();
        let x = Self::ndarray_to_densematrix(features);

        let votes = self
            .trees
            .par_iter()
            .map(|member| {
                let mut counts = Array2::<f64>::zeros((n_samples, self.n_classes));
                match member {
                    BaggedTree::Constant(class) => counts.column_mut(*class).fill(1.0),
                    BaggedTree::Tree(tree) => {
                        let predicted = tree
                            .predict(&x)
                            .map_err(|e| AppError::Model(format!("Prediction failed: {}", e)))?;
                        for (row, &class) in predicted.iter().enumerate() {
                            if class >= 0 && (class as usize) < self.n_classes {
                                counts[[row, class as usize]] += 1.0;
                            }
                        }
                    }
                }
                Ok::<_, AppError>(counts)
            })
            .try_reduce(|| Array2::zeros((n_samples, self.n_classes)), |a, b| Ok(a + b))?;

        Ok(votes / self.trees.len().max(1) as f64)
    }

    fn model_type(&self) -> ModelType {
        ModelType::BalancedBagging
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::tests::{separable_dataset, small_params};

    #[test]
    fn test_balanced_resample_equalizes_classes() {
        let labels = vec![0, 0, 0, 0, 0, 0, 1, 1, 2, 2, 2];
        let mut rng = StdRng::seed_from_u64(3);
        let rows = balanced_resample(&labels, &mut rng);

        assert_eq!(rows.len(), 6);
        for class in 0..3 {
            assert_eq!(rows.iter().filter(|&&r| labels[r] == class).count(), 2);
        }
    }

    #[test]
    fn test_bagging_handles_imbalance() {
        let (mut features, mut labels) = separable_dataset(20, 2);
        // Keep only 4 rows of class 1
        let keep: Vec<usize> = (0..24).collect();
        features = features.select(Axis(0), &keep);
        labels.truncate(24);

        let mut model = BalancedBagging::new(small_params());
        model.fit(&features, &labels, 2).unwrap();

        let predictions = model.predict(&features).unwrap();
        assert_eq!(predictions[23], 1);
        assert_eq!(predictions[0], 0);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (features, labels) = separable_dataset(6, 3);
        let mut model = BalancedBagging::new(small_params());
        model.fit(&features, &labels, 3).unwrap();

        let proba = model.predict_proba(&features).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_single_class_is_constant() {
        let (features, _) = separable_dataset(4, 2);
        let labels = vec![0; features.nrows()];
        let mut model = BalancedBagging::new(small_params());

        model.fit(&features, &labels, 1).unwrap();
        assert_eq!(model.predict(&features).unwrap(), vec![0; features.nrows()]);
    }
}
