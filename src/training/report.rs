use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dataset::{ClassDistribution, LabelColumn};
use crate::error::{AppError, Result};
use crate::ml::{ClassificationReport, ConfusionPair, ModelType};
use crate::training::stage::TrainingStage;

/// Record count after a data stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageShape {
    pub stage: TrainingStage,
    pub records: usize,
}

/// Training and evaluation results for one label column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnReport {
    pub column: LabelColumn,
    pub n_classes: usize,

    /// Support per class after filtering
    pub class_counts: BTreeMap<String, usize>,

    /// Distribution before filtering
    pub raw_distribution: ClassDistribution,

    pub train_records: usize,
    pub validation_records: usize,

    pub best_params: BTreeMap<String, String>,

    /// Mean cross-validated weighted F1 of the chosen parameters
    pub cv_score: Option<f64>,

    /// `None` when no validation rows were available
    pub validation: Option<ClassificationReport>,

    pub top_confusions: Vec<ConfusionPair>,
}

/// Metrics artifact written at the end of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub model_type: ModelType,
    pub stages: Vec<StageShape>,

    /// Held-out rows dropped because a label was never seen in training
    pub dropped_unseen_test_rows: usize,

    pub columns: Vec<ColumnReport>,
}

impl TrainingReport {
    pub fn column(&self, column: LabelColumn) -> Option<&ColumnReport> {
        self.columns.iter().find(|c| c.column == column)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::InputDefect(format!("cannot read report {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Human-readable summary for the terminal
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run {} ({})", self.run_id, self.started_at.to_rfc3339());
        let _ = writeln!(
            out,
            "Model: {}, elapsed {:.1}s",
            self.model_type, self.elapsed_seconds
        );
        for shape in &self.stages {
            let _ = writeln!(out, "  {:<10} {:>8} records", shape.stage, shape.records);
        }
        if self.dropped_unseen_test_rows > 0 {
            let _ = writeln!(
                out,
                "  dropped {} test rows with unseen labels",
                self.dropped_unseen_test_rows
            );
        }

        for column in &self.columns {
            let _ = writeln!(
                out,
                "\n[{}] {} classes, {} train / {} validation",
                column.column, column.n_classes, column.train_records, column.validation_records
            );
            match &column.validation {
                Some(report) => {
                    let _ = writeln!(
                        out,
                        "  accuracy {:.4}  macro F1 {:.4}  weighted F1 {:.4}",
                        report.accuracy, report.macro_avg.f1_score, report.weighted_avg.f1_score
                    );
                }
                None => {
                    let _ = writeln!(out, "  no validation rows");
                }
            }
            for pair in &column.top_confusions {
                let _ = writeln!(
                    out,
                    "  {} -> {}: {}",
                    pair.true_label, pair.predicted_label, pair.count
                );
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::AverageMetrics;

    fn report() -> TrainingReport {
        let avg = AverageMetrics {
            precision: 0.9,
            recall: 0.8,
            f1_score: 0.85,
            support: 10,
        };
        TrainingReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            elapsed_seconds: 1.5,
            model_type: ModelType::RandomForest,
            stages: vec![StageShape {
                stage: TrainingStage::Raw,
                records: 12,
            }],
            dropped_unseen_test_rows: 0,
            columns: vec![ColumnReport {
                column: LabelColumn::Category,
                n_classes: 2,
                class_counts: BTreeMap::from([("Fraud".to_string(), 8)]),
                raw_distribution: ClassDistribution {
                    column: LabelColumn::Category,
                    total_classes: 2,
                    singleton_classes: 1,
                    top_classes: vec![("Fraud".to_string(), 8)],
                    below_threshold: vec![("Spam".to_string(), 1)],
                },
                train_records: 8,
                validation_records: 2,
                best_params: BTreeMap::new(),
                cv_score: None,
                validation: Some(ClassificationReport {
                    accuracy: 0.9,
                    macro_avg: avg.clone(),
                    weighted_avg: avg,
                    per_class: BTreeMap::new(),
                }),
                top_confusions: vec![ConfusionPair {
                    true_label: "Fraud".to_string(),
                    predicted_label: "Spam".to_string(),
                    count: 1,
                }],
            }],
        }
    }

    #[test]
    fn test_json_round_trip_keeps_fields() {
        let report = report();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"run_id\""));
        assert!(json.contains("\"category\""));

        let parsed = TrainingReport::from_json(&json).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        assert_eq!(parsed.column(LabelColumn::Category).unwrap().n_classes, 2);
        assert!(parsed.column(LabelColumn::SubCategory).is_none());
    }

    #[test]
    fn test_summary_mentions_confusions() {
        let summary = report().summary();
        assert!(summary.contains("Fraud -> Spam: 1"));
        assert!(summary.contains("weighted F1 0.8500"));
    }
}
