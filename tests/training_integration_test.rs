/// Integration tests for the training run
///
/// Covers loading CSV files, filtering rare classes, fitting both columns
/// and persisting the model bundle with its metrics report.
mod common;

use common::{fast_config, fraud_text, hacking_text, two_class_records, write_csv};
use crime_report_classifier::{
    dataset::{LabelColumn, Record},
    ml::TrainedModel,
    training::TrainingStage,
    AppError, Trainer, TrainingReport,
};

#[test]
fn test_run_writes_model_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = write_csv(dir.path(), "train.csv", &two_class_records(12));

    let mut config = fast_config();
    config.data.train_path = train_path;
    config.output.model_path = dir.path().join("out/model.bin");
    config.output.metrics_path = dir.path().join("out/metrics.json");

    let mut trainer = Trainer::new(config.clone());
    let outcome = trainer.run().unwrap();
    assert_eq!(trainer.stage(), TrainingStage::Persisted);

    let model = TrainedModel::load(&config.output.model_path).unwrap();
    assert_eq!(
        model.column(LabelColumn::Category).encoder().classes(),
        &["Cyber Attack".to_string(), "Online Financial Fraud".to_string()]
    );

    let report = TrainingReport::load(&config.output.metrics_path).unwrap();
    assert_eq!(report.run_id, outcome.report.run_id);
    assert_eq!(report.columns.len(), 2);
    for column in LabelColumn::ALL {
        let column_report = report.column(column).unwrap();
        assert_eq!(column_report.n_classes, 2);
        assert!(column_report.validation.is_some());
    }

    // No staging files left behind
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("out"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_run_with_held_out_test_file() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = write_csv(dir.path(), "train.csv", &two_class_records(10));

    let mut test_records = two_class_records(3);
    test_records.push(Record::new(
        "Received threatening messages on social media from a stranger",
        "Harassment",
        "Cyber Stalking",
    ));
    let test_path = write_csv(dir.path(), "test.csv", &test_records);

    let mut config = fast_config();
    config.data.train_path = train_path;
    config.data.test_path = Some(test_path);
    config.output.model_path = dir.path().join("model.bin");
    config.output.metrics_path = dir.path().join("metrics.json");

    let outcome = Trainer::new(config).run().unwrap();

    assert_eq!(outcome.report.dropped_unseen_test_rows, 1);
    let category = outcome.report.column(LabelColumn::Category).unwrap();
    assert_eq!(category.validation_records, 6);
    assert_eq!(category.train_records, 20);
}

#[test]
fn test_no_class_meets_threshold_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let records = vec![
        Record::new(fraud_text(0), "Online Financial Fraud", "UPI Related Frauds"),
        Record::new(hacking_text(0), "Cyber Attack", "Email Hacking"),
        Record::new(
            "Received threatening messages on social media from a stranger",
            "Harassment",
            "Cyber Stalking",
        ),
    ];
    let train_path = write_csv(dir.path(), "train.csv", &records);

    let mut config = fast_config();
    config.data.train_path = train_path;
    config.filtering.min_samples_per_class = 5;
    config.output.model_path = dir.path().join("model.bin");
    config.output.metrics_path = dir.path().join("metrics.json");

    let err = Trainer::new(config.clone()).run().unwrap_err();
    assert!(matches!(err, AppError::InsufficientData(_)));
    assert!(!config.output.model_path.exists());
    assert!(!config.output.metrics_path.exists());
}

#[test]
fn test_missing_training_file_is_input_defect() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config();
    config.data.train_path = dir.path().join("absent.csv");

    let err = Trainer::new(config).run().unwrap_err();
    assert!(matches!(err, AppError::InputDefect(_)));
}

#[test]
fn test_rare_class_is_filtered_out() {
    let mut records = Vec::new();
    for i in 0..8 {
        records.push(Record::new(fraud_text(i), "Fraud", "UPI"));
    }
    records.push(Record::new(
        "You have won a lottery prize claim it now by sending your details",
        "Spam",
        "Lottery",
    ));

    let mut config = fast_config();
    config.filtering.min_samples_per_class = 5;

    let outcome = Trainer::new(config)
        .train(crime_report_classifier::dataset::Dataset::new(records), None)
        .unwrap();

    let category = outcome.report.column(LabelColumn::Category).unwrap();
    assert_eq!(category.n_classes, 1);
    assert_eq!(category.class_counts.get("Fraud"), Some(&8));
    assert!(!category.class_counts.contains_key("Spam"));
    assert_eq!(
        outcome.model.column(LabelColumn::Category).encoder().classes(),
        &["Fraud".to_string()]
    );
}

#[test]
fn test_search_selects_candidate_from_grid() {
    let mut config = fast_config();
    config.search.enabled = true;
    config.search.cv_folds = 2;
    config.search.n_estimators = vec![5, 10];
    config.search.max_depth = vec![4];
    config.search.min_samples_split = vec![2];
    config.search.max_features = vec![1000];

    let outcome = Trainer::new(config)
        .train(common::two_class_dataset(10), None)
        .unwrap();

    let category = outcome.report.column(LabelColumn::Category).unwrap();
    assert!(category.cv_score.is_some());
    let n_estimators = category.best_params.get("n_estimators").unwrap();
    assert!(n_estimators == "5" || n_estimators == "10");
}
