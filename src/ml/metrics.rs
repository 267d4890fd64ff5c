//! Classification report, weighted F1 and confusion analysis

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::ml::models::{AverageMetrics, ClassMetrics, ClassificationReport, ConfusionPair};

/// Score reported when a ratio has a zero denominator
const ZERO_DIVISION: f64 = 1.0;

struct Counts {
    tp: usize,
    fp: usize,
    fn_count: usize,
}

impl Counts {
    fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_count)
    }

    fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_count)
    }

    fn support(&self) -> usize {
        self.tp + self.fn_count
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        ZERO_DIVISION
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Per-class counts for every class occurring in `y_true` or `y_pred`
fn class_counts(y_true: &[usize], y_pred: &[usize]) -> BTreeMap<usize, Counts> {
    let classes: BTreeSet<usize> = y_true.iter().chain(y_pred.iter()).copied().collect();

    classes
        .into_iter()
        .map(|class| {
            let mut counts = Counts {
                tp: 0,
                fp: 0,
                fn_count: 0,
            };
            for (&t, &p) in y_true.iter().zip(y_pred) {
                match (t == class, p == class) {
                    (true, true) => counts.tp += 1,
                    (false, true) => counts.fp += 1,
                    (true, false) => counts.fn_count += 1,
                    (false, false) => {}
                }
            }
            (class, counts)
        })
        .collect()
}

fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    ratio(correct, y_true.len())
}

/// Support-weighted F1 over the classes present in either vector
pub fn weighted_f1(y_true: &[usize], y_pred: &[usize]) -> f64 {
    let counts = class_counts(y_true, y_pred);
    let total: usize = counts.values().map(Counts::support).sum();
    if total == 0 {
        return 0.0;
    }

    counts
        .values()
        .map(|c| c.f1() * c.support() as f64)
        .sum::<f64>()
        / total as f64
}

/// Precision/recall/F1/support per class plus accuracy and averages.
///
/// `classes` maps ids to names; ids without a name are reported by number.
pub fn classification_report(
    y_true: &[usize],
    y_pred: &[usize],
    classes: &[String],
) -> ClassificationReport {
    let counts = class_counts(y_true, y_pred);
    let name = |id: usize| {
        classes
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", id))
    };

    let per_class: BTreeMap<String, ClassMetrics> = counts
        .iter()
        .map(|(&id, c)| {
            (
                name(id),
                ClassMetrics {
                    precision: c.precision(),
                    recall: c.recall(),
                    f1_score: c.f1(),
                    support: c.support(),
                },
            )
        })
        .collect();

    let total_support: usize = per_class.values().map(|m| m.support).sum();
    let n = per_class.len().max(1) as f64;

    let macro_avg = AverageMetrics {
        precision: per_class.values().map(|m| m.precision).sum::<f64>() / n,
        recall: per_class.values().map(|m| m.recall).sum::<f64>() / n,
        f1_score: per_class.values().map(|m| m.f1_score).sum::<f64>() / n,
        support: total_support,
    };

    let weighted = |metric: fn(&ClassMetrics) -> f64| {
        if total_support == 0 {
            0.0
        } else {
            per_class
                .values()
                .map(|m| metric(m) * m.support as f64)
                .sum::<f64>()
                / total_support as f64
        }
    };

    let weighted_avg = AverageMetrics {
        precision: weighted(|m| m.precision),
        recall: weighted(|m| m.recall),
        f1_score: weighted(|m| m.f1_score),
        support: total_support,
    };

    ClassificationReport {
        accuracy: accuracy(y_true, y_pred),
        macro_avg,
        weighted_avg,
        per_class,
    }
}

/// Most frequent (true, predicted) pairs among misclassified samples.
///
/// Ties are ordered by true label, then predicted label.
pub fn top_confusions(
    y_true: &[usize],
    y_pred: &[usize],
    classes: &[String],
    limit: usize,
) -> Vec<ConfusionPair> {
    let mut pairs: HashMap<(usize, usize), usize> = HashMap::new();
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t != p {
            *pairs.entry((t, p)).or_insert(0) += 1;
        }
    }

    let name = |id: usize| {
        classes
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", id))
    };

    let mut pairs: Vec<ConfusionPair> = pairs
        .into_iter()
        .map(|((t, p), count)| ConfusionPair {
            true_label: name(t),
            predicted_label: name(p),
            count,
        })
        .collect();

    pairs.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.true_label.cmp(&b.true_label))
            .then_with(|| a.predicted_label.cmp(&b.predicted_label))
    });
    pairs.truncate(limit);
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["Fraud".to_string(), "Hacking".to_string(), "Spam".to_string()]
    }

    #[test]
    fn test_perfect_predictions() {
        let y = vec![0, 1, 2, 1];
        let report = classification_report(&y, &y, &names());

        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.macro_avg.f1_score, 1.0);
        assert_eq!(report.weighted_avg.f1_score, 1.0);
        assert_eq!(report.per_class["Hacking"].support, 2);
        assert_eq!(weighted_f1(&y, &y), 1.0);
    }

    #[test]
    fn test_report_values() {
        let y_true = vec![0, 0, 0, 1];
        let y_pred = vec![0, 0, 1, 1];
        let report = classification_report(&y_true, &y_pred, &names());

        let fraud = &report.per_class["Fraud"];
        assert_eq!(fraud.precision, 1.0);
        assert!((fraud.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((fraud.f1_score - 0.8).abs() < 1e-12);

        let hacking = &report.per_class["Hacking"];
        assert_eq!(hacking.precision, 0.5);
        assert_eq!(hacking.recall, 1.0);

        assert_eq!(report.accuracy, 0.75);
        let expected_weighted = (0.8 * 3.0 + (2.0 / 3.0)) / 4.0;
        assert!((report.weighted_avg.f1_score - expected_weighted).abs() < 1e-12);
        assert!((weighted_f1(&y_true, &y_pred) - expected_weighted).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_scores_one() {
        // "Spam" is predicted but never true: recall has a zero denominator
        let y_true = vec![0, 0];
        let y_pred = vec![0, 2];
        let report = classification_report(&y_true, &y_pred, &names());

        let spam = &report.per_class["Spam"];
        assert_eq!(spam.support, 0);
        assert_eq!(spam.recall, 1.0);
        assert_eq!(spam.precision, 0.0);
        assert!(!report.per_class.contains_key("Hacking"));
    }

    #[test]
    fn test_top_confusions() {
        let y_true = vec![0, 0, 0, 1, 1, 2];
        let y_pred = vec![1, 1, 0, 0, 2, 0];
        let pairs = top_confusions(&y_true, &y_pred, &names(), 2);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].true_label, "Fraud");
        assert_eq!(pairs[0].predicted_label, "Hacking");
        assert_eq!(pairs[0].count, 2);
        assert_eq!(pairs[1].true_label, "Hacking");
        assert_eq!(pairs[1].predicted_label, "Fraud");
    }
}
