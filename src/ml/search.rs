//! Exhaustive hyperparameter search under stratified k-fold cross-validation

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{FeatureConfig, ModelKind, SearchConfig};
use crate::dataset::split::{stratified_k_fold, SplitIndices};
use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, ClassifierModel};
use crate::ml::features::TfidfVectorizer;
use crate::ml::metrics::weighted_f1;
use crate::ml::models::TreeParams;

/// One point of the grid: vectorizer settings plus tree hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub features: FeatureConfig,
    pub params: TreeParams,
}

impl Candidate {
    /// Flat parameter map as recorded in reports
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = self.params.to_map();
        map.insert(
            "max_features".to_string(),
            self.features.max_features.to_string(),
        );
        map.insert(
            "ngram_range".to_string(),
            format!("({}, {})", self.features.ngram_range.0, self.features.ngram_range.1),
        );
        map
    }
}

/// Mean cross-validated score of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: BTreeMap<String, String>,
    pub mean_score: f64,
    pub folds: usize,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: Candidate,
    pub best_score: f64,
    pub scores: Vec<CandidateScore>,
}

/// Grid search over ensemble and vectorizer hyperparameters, scored by weighted F1
pub struct GridSearch {
    config: SearchConfig,
    kind: ModelKind,
    voting_weights: Vec<f64>,
    base: Candidate,
}

impl GridSearch {
    pub fn new(
        config: SearchConfig,
        kind: ModelKind,
        voting_weights: Vec<f64>,
        base: Candidate,
    ) -> Self {
        Self {
            config,
            kind,
            voting_weights,
            base,
        }
    }

    /// Cartesian product of the configured value lists
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for &n_estimators in &self.config.n_estimators {
            for &max_depth in &self.config.max_depth {
                for &min_samples_split in &self.config.min_samples_split {
                    for &max_features in &self.config.max_features {
                        for &ngram_range in &self.config.ngram_ranges {
                            candidates.push(Candidate {
                                features: FeatureConfig {
                                    max_features,
                                    ngram_range,
                                    ..self.base.features.clone()
                                },
                                params: TreeParams {
                                    n_estimators,
                                    max_depth: (max_depth > 0).then_some(max_depth),
                                    min_samples_split: min_samples_split.max(2),
                                    ..self.base.params.clone()
                                },
                            });
                        }
                    }
                }
            }
        }

        candidates
    }

    /// Score every candidate and return the best one.
    ///
    /// Falls back to the base candidate when the data cannot form any fold.
    pub fn run<S: AsRef<str> + Sync>(
        &self,
        texts: &[S],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<SearchOutcome> {
        let folds = stratified_k_fold(labels, self.config.cv_folds, self.base.params.seed);
        if folds.is_empty() {
            warn!("Too few samples for cross-validation, using base parameters");
            return Ok(SearchOutcome {
                best: self.base.clone(),
                best_score: 0.0,
                scores: Vec::new(),
            });
        }

        let candidates = self.candidates();
        info!(
            candidates = candidates.len(),
            folds = folds.len(),
            "Starting grid search"
        );

        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let results: Vec<(usize, Result<f64>)> = jobs
            .par_iter()
            .map(|&(c, f)| {
                let fold = &folds[f];
                let score = self.evaluate_fold(&candidates[c], texts, labels, n_classes, fold);
                (c, score)
            })
            .collect();

        let mut fold_scores: Vec<Vec<f64>> = vec![Vec::new(); candidates.len()];
        let mut failed = vec![false; candidates.len()];
        for (c, result) in results {
            match result {
                Ok(score) => fold_scores[c].push(score),
                Err(e) => {
                    debug!(candidate = c, error = %e, "Fold evaluation failed");
                    failed[c] = true;
                }
            }
        }

        let mut best: Option<(usize, f64)> = None;
        let mut scores = Vec::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            if failed[idx] {
                warn!(params = ?candidate.to_map(), "Skipping candidate after failed fold");
                continue;
            }

            let mean = fold_scores[idx].iter().sum::<f64>() / fold_scores[idx].len() as f64;
            scores.push(CandidateScore {
                params: candidate.to_map(),
                mean_score: mean,
                folds: fold_scores[idx].len(),
            });

            if best.map_or(true, |(_, score)| mean > score) {
                best = Some((idx, mean));
            }
        }

        let (best_idx, best_score) = best.ok_or_else(|| {
            AppError::Model("every grid search candidate failed to fit".to_string())
        })?;

        info!(
            best_score,
            params = ?candidates[best_idx].to_map(),
            "Grid search finished"
        );

        Ok(SearchOutcome {
            best: candidates[best_idx].clone(),
            best_score,
            scores,
        })
    }

    fn evaluate_fold<S: AsRef<str>>(
        &self,
        candidate: &Candidate,
        texts: &[S],
        labels: &[usize],
        n_classes: usize,
        fold: &SplitIndices,
    ) -> Result<f64> {
        let pick = |rows: &[usize]| {
            rows.iter()
                .map(|&i| texts[i].as_ref())
                .collect::<Vec<&str>>()
        };
        let train_texts = pick(&fold.train);
        let validation_texts = pick(&fold.validation);
        let train_labels: Vec<usize> = fold.train.iter().map(|&i| labels[i]).collect();
        let validation_labels: Vec<usize> = fold.validation.iter().map(|&i| labels[i]).collect();

        let mut vectorizer = TfidfVectorizer::new(candidate.features.clone());
        let x_train = vectorizer.fit_transform(&train_texts)?;
        let x_validation = vectorizer.transform(&validation_texts)?;

        let mut model =
            ClassifierModel::build(self.kind, candidate.params.clone(), &self.voting_weights);
        model.fit(&x_train, &train_labels, n_classes)?;
        let predicted = model.predict(&x_validation)?;

        Ok(weighted_f1(&validation_labels, &predicted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Candidate {
        Candidate {
            features: FeatureConfig {
                max_features: 100,
                ngram_range: (1, 1),
                min_df: 1,
                max_df: 1.0,
            },
            params: TreeParams {
                n_estimators: 5,
                max_depth: Some(4),
                min_samples_split: 2,
                min_samples_leaf: 1,
                feature_fraction: 1.0,
                class_weighting: true,
                seed: 7,
            },
        }
    }

    fn small_grid() -> SearchConfig {
        SearchConfig {
            enabled: true,
            cv_folds: 3,
            n_estimators: vec![3, 5],
            max_depth: vec![3, 0],
            min_samples_split: vec![2],
            max_features: vec![50],
            ngram_ranges: vec![(1, 1), (1, 2)],
        }
    }

    #[test]
    fn test_candidates_cover_grid() {
        let search = GridSearch::new(small_grid(), ModelKind::RandomForest, vec![1.0, 1.0], base());
        let candidates = search.candidates();

        assert_eq!(candidates.len(), 8);
        assert!(candidates.iter().any(|c| c.params.max_depth.is_none()));
        assert!(candidates.iter().all(|c| c.features.min_df == 1));
    }

    #[test]
    fn test_search_picks_a_candidate() {
        let mut texts = Vec::new();
        let mut labels = Vec::new();
        for i in 0..6 {
            texts.push(format!("upi payment fraud money debited {}", i));
            labels.push(0);
            texts.push(format!("email account hacked password changed {}", i));
            labels.push(1);
        }

        let search = GridSearch::new(small_grid(), ModelKind::RandomForest, vec![1.0, 1.0], base());
        let outcome = search.run(&texts, &labels, 2).unwrap();

        assert_eq!(outcome.scores.len(), 8);
        assert!(outcome.best_score > 0.9);
        assert!(search.candidates().contains(&outcome.best));
    }

    #[test]
    fn test_falls_back_without_folds() {
        let search = GridSearch::new(small_grid(), ModelKind::RandomForest, vec![1.0, 1.0], base());
        let outcome = search.run(&["only one"], &[0], 1).unwrap();
        assert_eq!(outcome.best, base());
    }
}
