use crate::error::{AppError, Result};
use crate::ml::classifier::{
    check_training_input, class_weights, sample_features, single_class, Classifier,
};
use crate::ml::models::{ModelType, TreeParams};
use linfa::prelude::*;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One bootstrap tree and the feature columns it was grown on
#[derive(Debug, Serialize, Deserialize)]
struct ForestTree {
    columns: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

/// Random forest of class-weighted Gini trees
#[derive(Debug, Serialize, Deserialize)]
pub struct RandomForest {
    /// Hyperparameters
    params: TreeParams,

    /// Fitted trees
    trees: Vec<ForestTree>,

    /// Set when the training labels held a single class
    constant: Option<usize>,

    /// Number of classes
    n_classes: usize,

    /// Number of feature columns seen at fit time
    n_features: usize,

    /// Is trained
    trained: bool,
}

impl RandomForest {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            constant: None,
            n_classes: 0,
            n_features: 0,
            trained: false,
        }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn fit_tree(
        &self,
        features: &Array2<f64>,
        labels: &[usize],
        weights: &[f64],
        tree_idx: usize,
    ) -> Result<ForestTree> {
        let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(tree_idx as u64));
        let n_samples = labels.len();

        let rows: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
        let columns = sample_features(features.ncols(), self.params.feature_fraction, &mut rng);

        let records = bootstrap_records(features, &rows, &columns);
        let targets: Array1<usize> = rows.iter().map(|&r| labels[r]).collect();
        let sample_weights: Array1<f32> = rows.iter().map(|&r| weights[labels[r]] as f32).collect();

        let dataset = Dataset::new(records, targets).with_weights(sample_weights);

        let tree = DecisionTree::<f64, usize>::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(self.params.max_depth)
            .min_weight_split(self.params.min_samples_split as f32)
            .min_weight_leaf(self.params.min_samples_leaf as f32)
            .fit(&dataset)
            .map_err(|e| AppError::Model(format!("Failed to fit forest tree {}: {}", tree_idx, e)))?;

        Ok(ForestTree { columns, tree })
    }
}

/// Gather `rows` x `columns` of `features` into one allocation
fn bootstrap_records(features: &Array2<f64>, rows: &[usize], columns: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), columns.len()), |(i, j)| {
        features[[rows[i], columns[j]]]
    })
}

impl Classifier for RandomForest {
    fn fit(&mut self, features: &Array2<f64>, labels: &[usize], n_classes: usize) -> Result<()> {
        check_training_input(features, labels, n_classes)?;

        self.n_classes = n_classes;
        self.n_features = features.ncols();
        self.trees.clear();
        self.constant = single_class(labels);

        if self.constant.is_none() {
            let weights = if self.params.class_weighting {
                class_weights(labels, n_classes)
            } else {
                vec![1.0; n_classes]
            };

            self.trees = (0..self.params.n_estimators)
                .into_par_iter()
                .map(|idx| self.fit_tree(features, labels, &weights, idx))
                .collect::<Result<Vec<_>>>()?;
        }

        debug!(
            trees = self.trees.len(),
            n_classes,
            n_samples = labels.len(),
            n_features = self.n_features,
            "Fitted random forest"
        );

        self.trained = true;
        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.trained {
            return Err(AppError::Model("Random forest not trained".to_string()));
        }
        if features.ncols() != self.n_features {
            return Err(AppError::Model(format!(
                "expected {} feature columns, got {}",
                self.n_features,
                features.ncols()
            )));
        }

        let n_samples = features.nrows();
        let mut proba = Array2::zeros((n_samples, self.n_classes));

        if let Some(class) = self.constant {
            proba.column_mut(class).fill(1.0);
            return Ok(proba);
        }

        let votes = self
            .trees
            .par_iter()
            .map(|forest_tree| {
                let records = features.select(Axis(1), &forest_tree.columns);
                let predicted: Array1<usize> = forest_tree.tree.predict(&records);

                let mut counts = Array2::<f64>::zeros((n_samples, self.n_classes));
                for (row, &class) in predicted.iter().enumerate() {
                    if class < self.n_classes {
                        counts[[row, class]] += 1.0;
                    }
                }
                counts
            })
            .reduce(|| Array2::zeros((n_samples, self.n_classes)), |a, b| a + b);

        proba += &votes;
        proba /= self.trees.len().max(1) as f64;
        Ok(proba)
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}
