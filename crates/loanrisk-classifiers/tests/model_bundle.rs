//! Integration tests: fit, persist, reload and explain a model bundle.

use std::fs;

use loanrisk_classifiers::artifacts::{ModelBundle, CATEGORICAL_FILE, COLUMNS_FILE, MODEL_FILE};
use loanrisk_classifiers::config::{BootstrapConfig, ModelConfig};
use loanrisk_classifiers::data_handling::{stratified_split, Column, Record, Table};
use loanrisk_classifiers::evaluation::evaluate_with_bootstrap;
use loanrisk_classifiers::explain::{global_importance, sample_rows};
use loanrisk_classifiers::models::{ClassifierModel, XGBoostClassifier};
use loanrisk_classifiers::schema::FeatureSchema;
use loanrisk_classifiers::task::LoanTask;
use tempfile::tempdir;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Defaults concentrate in grades C/D and at high interest rates.
fn synthetic_loans(n: usize) -> Table {
    let grades = ["A", "B", "C", "D"];
    let mut grade = Vec::with_capacity(n);
    let mut int_rate = Vec::with_capacity(n);
    let mut annual_inc = Vec::with_capacity(n);
    let mut target = Vec::with_capacity(n);
    for i in 0..n {
        let g = (i * 7) % 4;
        let rate = 6.0 + g as f64 * 4.0 + ((i * 13) % 10) as f64 * 0.3;
        grade.push(Some(grades[g].to_string()));
        int_rate.push(Some(rate));
        annual_inc.push(if i % 17 == 0 { None } else { Some(30_000.0 + ((i * 31) % 50) as f64 * 1_000.0) });
        let noise = (i * 11) % 10 == 0;
        let default = (g >= 2 && rate > 14.5) != noise;
        target.push(Some(if default { 1.0 } else { 0.0 }));
    }
    Table::from_columns(vec![
        ("grade".to_string(), Column::Text(grade)),
        ("int_rate".to_string(), Column::Numeric(int_rate)),
        ("annual_inc".to_string(), Column::Numeric(annual_inc)),
        ("target".to_string(), Column::Numeric(target)),
    ])
    .unwrap()
}

fn small_config() -> ModelConfig {
    ModelConfig {
        max_depth: 3,
        ..ModelConfig::default()
    }
    .with_rounds(30)
}

fn fitted_bundle() -> (ModelBundle, Table, Vec<i32>) {
    let labeled = LoanTask::DefaultRisk.split_labels(&synthetic_loans(400)).unwrap();
    let schema = FeatureSchema::infer(&labeled.features).unwrap();
    let x = schema.encode_table(&labeled.features).unwrap();
    let mut model = XGBoostClassifier::new(small_config());
    model.fit(&x, &labeled.labels).unwrap();
    let bundle = ModelBundle::new(model, schema).unwrap();
    (bundle, labeled.features, labeled.labels)
}

fn applicant(grade: &str, int_rate: f64) -> Record {
    Record::new()
        .with("grade", grade)
        .with("int_rate", int_rate)
        .with("annual_inc", 55_000.0)
}

// ---------------------------------------------------------------------------
// Training and evaluation
// ---------------------------------------------------------------------------

#[test]
fn model_learns_the_synthetic_signal() {
    let labeled = LoanTask::DefaultRisk.split_labels(&synthetic_loans(600)).unwrap();
    let schema = FeatureSchema::infer(&labeled.features).unwrap();
    assert_eq!(schema.categorical_names(), vec!["grade".to_string()]);

    let (train, test) = stratified_split(&labeled.labels, 0.25, 42).unwrap();
    let x = schema.encode_table(&labeled.features).unwrap();
    let x_train = x.select(ndarray::Axis(0), &train);
    let x_test = x.select(ndarray::Axis(0), &test);
    let y_train: Vec<i32> = train.iter().map(|&i| labeled.labels[i]).collect();
    let y_test: Vec<i32> = test.iter().map(|&i| labeled.labels[i]).collect();

    let mut model = XGBoostClassifier::new(small_config());
    model.fit(&x_train, &y_train).unwrap();
    assert_eq!(model.n_trees(), 30);

    let bootstrap = BootstrapConfig {
        n_iterations: 100,
        ..BootstrapConfig::default()
    };
    let report = evaluate_with_bootstrap(&model, &x_test, &y_test, &bootstrap).unwrap();
    assert!(report.metrics.roc_auc > 0.8, "auc = {}", report.metrics.roc_auc);
    assert_eq!(report.metrics.n_samples, test.len());
    assert!(report.bootstrap.ci_lower <= report.bootstrap.ci_upper);
    assert!(report.to_string().starts_with("ROC-AUC: "));
}

#[test]
fn stratified_split_keeps_class_balance() {
    let labels: Vec<i32> = (0..100).map(|i| i32::from(i < 20)).collect();
    let (train, test) = stratified_split(&labels, 0.2, 42).unwrap();
    assert_eq!(train.len() + test.len(), 100);
    assert_eq!(test.len(), 20);
    assert_eq!(test.iter().filter(|&&i| labels[i] == 1).count(), 4);
    assert_eq!(stratified_split(&labels, 0.2, 42).unwrap(), (train, test));
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn saved_bundle_predicts_identically_after_reload() {
    let (bundle, _, _) = fitted_bundle();
    let dir = tempdir().unwrap();
    bundle.save(dir.path()).unwrap();
    for file in [MODEL_FILE, COLUMNS_FILE, CATEGORICAL_FILE] {
        assert!(dir.path().join(file).exists(), "{} not written", file);
    }

    let first = ModelBundle::load(dir.path()).unwrap();
    let second = ModelBundle::load(dir.path()).unwrap();
    assert_eq!(first.schema, bundle.schema);
    assert_eq!(first.model.n_trees(), bundle.model.n_trees());
    assert_eq!(first.model.feature_importance(), bundle.model.feature_importance());

    let record = applicant("D", 19.5);
    let a = first.predict_record(&record).unwrap();
    let b = second.predict_record(&record).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, bundle.predict_record(&record).unwrap());
    assert!((0.0..=1.0).contains(&a.probability));
    assert_eq!(a.label, i32::from(a.margin > 0.0));
}

#[test]
fn risky_applicant_scores_above_safe_applicant() {
    let (bundle, _, _) = fitted_bundle();
    let risky = bundle.predict_record(&applicant("D", 19.5)).unwrap();
    let safe = bundle.predict_record(&applicant("A", 6.5)).unwrap();
    assert!(risky.probability > safe.probability);
}

#[test]
fn incomplete_and_unknown_input_still_scores() {
    let (bundle, _, _) = fitted_bundle();
    // unknown grade, no income
    let record = Record::new().with("grade", "Z").with("int_rate", 12.0);
    assert!(bundle.predict_record(&record).is_ok());
}

#[test]
fn level_absent_from_training_rows_scores_like_its_encoded_row() {
    let mut table = synthetic_loans(400);
    let grades: Vec<Option<String>> = (0..400)
        .map(|i| Some(if i == 399 { "E".to_string() } else { ["A", "B", "C", "D"][(i * 7) % 4].to_string() }))
        .collect();
    table.remove_column("grade");
    table.push_column("grade", Column::Text(grades)).unwrap();

    let labeled = LoanTask::DefaultRisk.split_labels(&table).unwrap();
    let schema = FeatureSchema::infer(&labeled.features).unwrap();
    let x = schema.encode_table(&labeled.features).unwrap();
    let train: Vec<usize> = (0..399).collect();
    let mut model = XGBoostClassifier::new(small_config());
    let y_train: Vec<i32> = train.iter().map(|&i| labeled.labels[i]).collect();
    model.fit(&x.select(ndarray::Axis(0), &train), &y_train).unwrap();
    let bundle = ModelBundle::new(model, schema).unwrap();

    let record = labeled.features.row(399);
    let encoded = bundle.schema.encode_record(&record);
    assert_eq!(encoded, x.row(399).to_vec());
    let held_out = x.select(ndarray::Axis(0), &[399]);
    let margin = bundle.model.decision_function(&held_out).unwrap()[0];
    assert_eq!(bundle.predict_record(&record).unwrap().margin, margin);
}

#[test]
fn missing_artifact_fails_to_load() {
    let (bundle, _, _) = fitted_bundle();
    let dir = tempdir().unwrap();
    bundle.save(dir.path()).unwrap();
    fs::remove_file(dir.path().join(COLUMNS_FILE)).unwrap();
    let err = ModelBundle::load(dir.path()).unwrap_err();
    assert!(format!("{:#}", err).contains(COLUMNS_FILE));
}

#[test]
fn inconsistent_categorical_list_fails_to_load() {
    let (bundle, _, _) = fitted_bundle();
    let dir = tempdir().unwrap();
    bundle.save(dir.path()).unwrap();
    fs::write(dir.path().join(CATEGORICAL_FILE), r#"["int_rate"]"#).unwrap();
    assert!(ModelBundle::load(dir.path()).is_err());
}

// ---------------------------------------------------------------------------
// Explanations
// ---------------------------------------------------------------------------

#[test]
fn record_attributions_add_up_to_the_margin() {
    let (bundle, _, _) = fitted_bundle();
    for record in [applicant("D", 19.5), applicant("B", 9.0), Record::new().with("int_rate", 15.0)] {
        let attribution = bundle.explain_record(&record).unwrap();
        let prediction = bundle.predict_record(&record).unwrap();
        assert_eq!(attribution.contributions.len(), 3);
        assert!((attribution.output - prediction.margin).abs() < 1e-9);
        assert!(
            (attribution.reconstructed() - attribution.output).abs() < 1e-4,
            "{} vs {}",
            attribution.reconstructed(),
            attribution.output
        );
    }
}

#[test]
fn global_importance_is_sorted_and_complete() {
    let (bundle, features, _) = fitted_bundle();
    let x = bundle.encode(&features).unwrap();
    let rows = sample_rows(x.nrows(), 100, 42);
    assert_eq!(rows.len(), 100);
    let sample = x.select(ndarray::Axis(0), &rows);
    let summary = global_importance(&bundle.model, &bundle.schema, &sample).unwrap();
    assert_eq!(summary.len(), 3);
    assert!(summary.windows(2).all(|w| w[0].1 >= w[1].1));
    assert_ne!(summary[0].0, "annual_inc");
}
