use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::config::DataConfig;
use crate::dataset::record::{Dataset, Record};
use crate::error::{AppError, Result};

/// Column names of the three fields a dataset file must provide
#[derive(Debug, Clone)]
pub struct DatasetSchema {
    pub text_column: String,
    pub category_column: String,
    pub sub_category_column: String,
}

impl DatasetSchema {
    pub fn from_config(config: &DataConfig) -> Self {
        Self {
            text_column: config.text_column.clone(),
            category_column: config.category_column.clone(),
            sub_category_column: config.sub_category_column.clone(),
        }
    }
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self::from_config(&DataConfig::default())
    }
}

/// Load a CSV dataset from `path`
pub fn load_csv(path: &Path, schema: &DatasetSchema) -> Result<Dataset> {
    let file = std::fs::File::open(path).map_err(|e| {
        AppError::InputDefect(format!("cannot open dataset {}: {}", path.display(), e))
    })?;

    let dataset = read_csv(file, schema).map_err(|e| match e {
        AppError::InputDefect(msg) => AppError::InputDefect(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;

    info!(path = %path.display(), records = dataset.len(), "Loaded dataset");
    Ok(dataset)
}

/// Read CSV records with a header row from any reader.
///
/// Short rows are tolerated; missing fields read as empty strings and are
/// dropped later by the cleaning stage.
pub fn read_csv<R: Read>(reader: R, schema: &DatasetSchema) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Fields)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let column_index = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            AppError::InputDefect(format!(
                "missing column '{}' (found: {})",
                name,
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })
    };

    let text_idx = column_index(&schema.text_column)?;
    let category_idx = column_index(&schema.category_column)?;
    let sub_category_idx = column_index(&schema.sub_category_column)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let field = |idx: usize| row.get(idx).unwrap_or_default().to_string();

        records.push(Record::new(
            field(text_idx),
            field(category_idx),
            field(sub_category_idx),
        ));
    }

    debug!(records = records.len(), "Parsed CSV rows");
    Ok(Dataset::new(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
category,sub_category,crimeaditionalinfo
Online Financial Fraud,UPI Related Frauds,Money debited from my account via UPI
Cyber Attack,Hacking,\"My email was hacked, password changed\"
Online Financial Fraud,Internet Banking Fraud
";

    #[test]
    fn test_read_csv_by_header_name() {
        let dataset = read_csv(CSV.as_bytes(), &DatasetSchema::default()).unwrap();

        assert_eq!(dataset.len(), 3);
        let first = &dataset.records()[0];
        assert_eq!(first.category, "Online Financial Fraud");
        assert_eq!(first.sub_category, "UPI Related Frauds");
        assert_eq!(first.text, "Money debited from my account via UPI");
        assert_eq!(dataset.records()[1].text, "My email was hacked, password changed");
    }

    #[test]
    fn test_short_rows_read_as_empty() {
        let dataset = read_csv(CSV.as_bytes(), &DatasetSchema::default()).unwrap();
        assert_eq!(dataset.records()[2].text, "");
    }

    #[test]
    fn test_missing_column_is_input_defect() {
        let csv = "category,sub_category\nFraud,UPI\n";
        let err = read_csv(csv.as_bytes(), &DatasetSchema::default()).unwrap_err();

        assert!(matches!(err, AppError::InputDefect(_)));
        assert!(err.to_string().contains("crimeaditionalinfo"));
    }

    #[test]
    fn test_missing_file_is_input_defect() {
        let err = load_csv(Path::new("/nonexistent/train.csv"), &DatasetSchema::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "INPUT_DEFECT");
    }
}
