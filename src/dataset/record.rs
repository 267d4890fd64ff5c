use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The two label columns every record carries
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LabelColumn {
    Category,
    SubCategory,
}

impl LabelColumn {
    /// Both columns, in training order
    pub const ALL: [LabelColumn; 2] = [LabelColumn::Category, LabelColumn::SubCategory];
}

/// Anything carrying a label per [`LabelColumn`]
pub trait Labeled {
    fn label(&self, column: LabelColumn) -> &str;
}

/// One raw crime report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Free-text description
    pub text: String,

    /// Category label
    pub category: String,

    /// Sub-category label
    pub sub_category: String,
}

impl Record {
    pub fn new(
        text: impl Into<String>,
        category: impl Into<String>,
        sub_category: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            sub_category: sub_category.into(),
        }
    }

    /// Both labels present and non-blank
    pub fn has_labels(&self) -> bool {
        !self.category.trim().is_empty() && !self.sub_category.trim().is_empty()
    }
}

impl Labeled for Record {
    fn label(&self, column: LabelColumn) -> &str {
        match column {
            LabelColumn::Category => &self.category,
            LabelColumn::SubCategory => &self.sub_category,
        }
    }
}

/// A record paired with its normalized text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedRecord {
    /// The source record, unchanged
    pub record: Record,

    /// Output of the text normalizer
    pub normalized_text: String,
}

impl Labeled for PreparedRecord {
    fn label(&self, column: LabelColumn) -> &str {
        self.record.label(column)
    }
}

/// Ordered collection of records sharing a schema
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset<T = Record> {
    records: Vec<T>,
}

impl<T> Dataset<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }

    /// Keep the records matching `keep`, returning a new dataset
    pub fn retain(self, mut keep: impl FnMut(&T) -> bool) -> Self {
        Self {
            records: self.records.into_iter().filter(|r| keep(r)).collect(),
        }
    }

    /// Transform every record, returning a new dataset
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Dataset<U> {
        Dataset {
            records: self.records.into_iter().map(f).collect(),
        }
    }
}

impl<T: Labeled> Dataset<T> {
    /// Labels of one column, in record order
    pub fn labels(&self, column: LabelColumn) -> Vec<&str> {
        self.records.iter().map(|r| r.label(column)).collect()
    }
}

impl<T> FromIterator<T> for Dataset<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_label_column_names() {
        assert_eq!(LabelColumn::Category.to_string(), "category");
        assert_eq!(LabelColumn::SubCategory.to_string(), "sub_category");
        assert_eq!(
            LabelColumn::from_str("sub_category").unwrap(),
            LabelColumn::SubCategory
        );
    }

    #[test]
    fn test_record_labels() {
        let record = Record::new("text", "Fraud", "UPI Fraud");
        assert_eq!(record.label(LabelColumn::Category), "Fraud");
        assert_eq!(record.label(LabelColumn::SubCategory), "UPI Fraud");
        assert!(record.has_labels());
        assert!(!Record::new("text", " ", "UPI Fraud").has_labels());
    }

    #[test]
    fn test_retain_returns_new_dataset() {
        let dataset: Dataset = vec![
            Record::new("a", "Fraud", "x"),
            Record::new("b", "Spam", "y"),
        ]
        .into_iter()
        .collect();

        let fraud = dataset.clone().retain(|r| r.category == "Fraud");
        assert_eq!(fraud.len(), 1);
        assert_eq!(dataset.len(), 2);
        assert_eq!(fraud.labels(LabelColumn::Category), vec!["Fraud"]);
    }
}
