use crate::error::{AppError, Result};
use crate::ml::classifier::{check_training_input, Classifier, ClassifierModel};
use crate::ml::models::ModelType;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Classifier paired with its voting weight
#[derive(Debug, Serialize, Deserialize)]
pub struct WeightedMember {
    pub model: ClassifierModel,
    pub weight: f64,
}

/// Weighted soft voting: averages member probabilities
#[derive(Debug, Serialize, Deserialize)]
pub struct VotingEnsemble {
    members: Vec<WeightedMember>,
    trained: bool,
}

impl VotingEnsemble {
    pub fn new(members: Vec<(ClassifierModel, f64)>) -> Self {
        Self {
            members: members
                .into_iter()
                .map(|(model, weight)| WeightedMember {
                    model,
                    weight: weight.max(0.0),
                })
                .collect(),
            trained: false,
        }
    }

    pub fn members(&self) -> &[WeightedMember] {
        &self.members
    }
}

impl Classifier for VotingEnsemble {
    fn fit(&mut self, features: &Array2<f64>, labels: &[usize], n_classes: usize) -> Result<()> {
        check_training_input(features, labels, n_classes)?;
        if self.members.is_empty() {
            return Err(AppError::Configuration(
                "voting ensemble has no members".to_string(),
            ));
        }

        for member in &mut self.members {
            member.model.fit(features, labels, n_classes)?;
        }

        self.trained = true;
        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.trained {
            return Err(AppError::Model("Voting ensemble not trained".to_string()));
        }

        let total_weight: f64 = self.members.iter().map(|m| m.weight).sum();
        if total_weight <= 0.0 {
            return Err(AppError::Configuration(
                "voting weights must not all be zero".to_string(),
            ));
        }

        let mut combined: Option<Array2<f64>> = None;
        for member in &self.members {
            let weighted = member.model.predict_proba(features)? * member.weight;
            combined = Some(match combined {
                Some(acc) => acc + weighted,
                None => weighted,
            });
        }

        combined
            .map(|proba| proba / total_weight)
            .ok_or_else(|| AppError::Internal("voting ensemble produced no output".to_string()))
    }

    fn model_type(&self) -> ModelType {
        ModelType::VotingEnsemble
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}
