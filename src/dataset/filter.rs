use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::record::{Dataset, LabelColumn, Labeled};
use crate::error::{AppError, Result};

/// Support count per class of one column
pub fn class_counts<T: Labeled>(dataset: &Dataset<T>, column: LabelColumn) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in dataset.iter() {
        *counts.entry(record.label(column).to_string()).or_insert(0) += 1;
    }
    counts
}

/// Drop records whose `column` label has fewer than `min_samples` occurrences
pub fn filter_rare_classes<T: Labeled>(
    dataset: Dataset<T>,
    column: LabelColumn,
    min_samples: usize,
) -> Result<Dataset<T>> {
    let counts = class_counts(&dataset, column);
    let valid: HashSet<&str> = counts
        .iter()
        .filter(|(_, &count)| count >= min_samples)
        .map(|(class, _)| class.as_str())
        .collect();

    if valid.is_empty() {
        return Err(AppError::InsufficientData(format!(
            "column '{}' has no class with at least {} samples (min_samples_per_class)",
            column, min_samples
        )));
    }

    let filtered = dataset.retain(|r| valid.contains(r.label(column)));
    if filtered.is_empty() {
        return Err(AppError::InsufficientData(format!(
            "no samples remaining after filtering rare '{}' classes with min_samples_per_class = {}",
            column, min_samples
        )));
    }

    Ok(filtered)
}

/// Filter both label columns until no rare class remains in either.
///
/// Dropping rows for one column can push a class of the other column below
/// the threshold, so passes repeat until the row count stops changing.
pub fn filter_rare_classes_joint<T: Labeled>(
    dataset: Dataset<T>,
    min_samples: usize,
) -> Result<Dataset<T>> {
    let original_len = dataset.len();
    let mut dataset = dataset;

    loop {
        let before = dataset.len();
        for column in LabelColumn::ALL {
            dataset = filter_rare_classes(dataset, column, min_samples)?;
        }
        if dataset.len() == before {
            break;
        }
    }

    info!(
        removed = original_len - dataset.len(),
        remaining = dataset.len(),
        min_samples,
        "Filtered rare classes"
    );

    Ok(dataset)
}

/// Class distribution summary for diagnostics and the metrics report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDistribution {
    pub column: LabelColumn,
    pub total_classes: usize,
    pub singleton_classes: usize,
    /// Most common classes, descending
    pub top_classes: Vec<(String, usize)>,
    /// Classes under the minimum-sample threshold
    pub below_threshold: Vec<(String, usize)>,
}

impl ClassDistribution {
    pub fn analyze<T: Labeled>(dataset: &Dataset<T>, column: LabelColumn, min_samples: usize) -> Self {
        let counts = class_counts(dataset, column);

        let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            column,
            total_classes: sorted.len(),
            singleton_classes: sorted.iter().filter(|(_, c)| *c == 1).count(),
            top_classes: sorted.iter().take(5).cloned().collect(),
            below_threshold: sorted
                .iter()
                .filter(|(_, c)| *c < min_samples)
                .cloned()
                .collect(),
        }
    }

    pub fn log(&self) {
        info!(
            column = %self.column,
            total_classes = self.total_classes,
            singleton_classes = self.singleton_classes,
            below_threshold = self.below_threshold.len(),
            top = ?self.top_classes,
            "Class distribution"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::record::Record;

    fn dataset(rows: &[(&str, &str, usize)]) -> Dataset {
        rows.iter()
            .flat_map(|(cat, sub, n)| (0..*n).map(move |i| Record::new(format!("text {}", i), *cat, *sub)))
            .collect()
    }

    #[test]
    fn test_filter_drops_rare_classes() {
        let data = dataset(&[("Fraud", "UPI", 8), ("Spam", "Mail", 1)]);
        let filtered = filter_rare_classes(data, LabelColumn::Category, 5).unwrap();

        assert_eq!(filtered.len(), 8);
        assert!(filtered.iter().all(|r| r.category == "Fraud"));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let data = dataset(&[("Fraud", "UPI", 6), ("Hacking", "Email", 3), ("Spam", "Mail", 2)]);
        let once = filter_rare_classes(data, LabelColumn::Category, 3).unwrap();
        let twice = filter_rare_classes(once.clone(), LabelColumn::Category, 3).unwrap();

        assert_eq!(once, twice);
        assert!(class_counts(&once, LabelColumn::Category).values().all(|&c| c >= 3));
    }

    #[test]
    fn test_no_class_meets_threshold() {
        let data = dataset(&[("Fraud", "UPI", 2), ("Spam", "Mail", 1)]);
        let err = filter_rare_classes(data, LabelColumn::Category, 5).unwrap_err();

        assert!(matches!(err, AppError::InsufficientData(_)));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_joint_filter_reaches_fixed_point() {
        // Dropping the rare "Mail" sub-category leaves "Spam" with 2 rows
        let data = dataset(&[
            ("Fraud", "UPI", 5),
            ("Spam", "Mail", 1),
            ("Spam", "Sms", 2),
            ("Hacking", "Sms", 3),
        ]);
        let filtered = filter_rare_classes_joint(data, 3).unwrap();

        for column in LabelColumn::ALL {
            assert!(class_counts(&filtered, column).values().all(|&c| c >= 3));
        }
        let again = filter_rare_classes_joint(filtered.clone(), 3).unwrap();
        assert_eq!(filtered, again);
    }

    #[test]
    fn test_distribution_summary() {
        let data = dataset(&[("Fraud", "UPI", 4), ("Spam", "Mail", 1), ("Hacking", "Email", 2)]);
        let dist = ClassDistribution::analyze(&data, LabelColumn::Category, 2);

        assert_eq!(dist.total_classes, 3);
        assert_eq!(dist.singleton_classes, 1);
        assert_eq!(dist.top_classes[0], ("Fraud".to_string(), 4));
        assert_eq!(dist.below_threshold, vec![("Spam".to_string(), 1)]);
    }
}
