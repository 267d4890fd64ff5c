//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use crime_report_classifier::config::{Config, ModelKind};
use crime_report_classifier::dataset::{Dataset, Record};

/// Small forest, no grid search, permissive document frequencies
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.filtering.min_samples_per_class = 3;
    config.features.min_df = 1;
    config.features.max_df = 1.0;
    config.model.kind = ModelKind::RandomForest;
    config.model.n_estimators = 10;
    config.model.max_depth = 6;
    config.model.min_samples_split = 2;
    config.model.min_samples_leaf = 1;
    config.search.enabled = false;
    config
}

pub fn fraud_text(i: usize) -> String {
    let variants = [
        "Money was debited from my bank account through an upi fraud transaction",
        "Fraudster took money from my bank account using a fake upi payment request",
        "Unknown caller asked for my upi pin and money was debited from my account",
        "Received a fraudulent upi collect request and lost money from my bank account",
    ];
    format!("{} reference {}", variants[i % variants.len()], i)
}

pub fn hacking_text(i: usize) -> String {
    let variants = [
        "Someone hacked my email account and changed the password",
        "Attacker gained access to my email and reset the password recovery options",
        "My email account was hacked and the hacker changed my password",
        "Hacker logged into my email account from another device and changed the password",
    ];
    format!("{} incident {}", variants[i % variants.len()], i)
}

/// Two well separated classes with `per_class` rows each
pub fn two_class_records(per_class: usize) -> Vec<Record> {
    let mut records = Vec::with_capacity(per_class * 2);
    for i in 0..per_class {
        records.push(Record::new(fraud_text(i), "Online Financial Fraud", "UPI Related Frauds"));
        records.push(Record::new(hacking_text(i), "Cyber Attack", "Email Hacking"));
    }
    records
}

pub fn two_class_dataset(per_class: usize) -> Dataset {
    Dataset::new(two_class_records(per_class))
}

/// Write `records` as a CSV file with the default column names
pub fn write_csv(dir: &Path, name: &str, records: &[Record]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer
        .write_record(["category", "sub_category", "crimeaditionalinfo"])
        .unwrap();
    for record in records {
        writer
            .write_record([
                record.category.as_str(),
                record.sub_category.as_str(),
                record.text.as_str(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
    path
}
