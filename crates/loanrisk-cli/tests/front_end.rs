//! Integration tests for the form engine, currency conversion, the model
//! cache and the interactive session loop.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::rc::Rc;

use anyhow::Result;
use loanrisk_classifiers::artifacts::ModelBundle;
use loanrisk_classifiers::config::ModelConfig;
use loanrisk_classifiers::data_handling::{Column, Record, Table, Value};
use loanrisk_classifiers::models::{ClassifierModel, XGBoostClassifier};
use loanrisk_classifiers::schema::FeatureSchema;
use loanrisk_classifiers::task::LoanTask;
use loanrisk_cli::app::cache::ModelCache;
use loanrisk_cli::app::currency::{resolve_rates, ConversionRates, Offline, RateProvider};
use loanrisk_cli::app::eligibility::EligibilityApp;
use loanrisk_cli::app::form::{collect, FieldSpec};
use loanrisk_cli::app::{run_session, FrontEnd, SessionOptions};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn tiny_bundle() -> Result<ModelBundle> {
    let n = 60;
    let income: Vec<Option<f64>> = (0..n).map(|i| Some(1_000.0 + 100.0 * i as f64)).collect();
    let history: Vec<Option<String>> = (0..n)
        .map(|i| Some(if i % 3 == 0 { "No" } else { "Yes" }.to_string()))
        .collect();
    let labels: Vec<i32> = (0..n).map(|i| i32::from(i % 3 != 0 && i > 10)).collect();
    let table = Table::from_columns(vec![
        ("income".to_string(), Column::Numeric(income)),
        ("history".to_string(), Column::Text(history)),
    ])?;
    let schema = FeatureSchema::infer(&table)?;
    let x = schema.encode_table(&table)?;
    let mut model = XGBoostClassifier::new(ModelConfig::default().with_rounds(5));
    model.fit(&x, &labels)?;
    ModelBundle::new(model, schema)
}

fn counting_cache() -> (ModelCache, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let cache = ModelCache::new(move || {
        counter.set(counter.get() + 1);
        tiny_bundle()
    });
    (cache, calls)
}

struct StubApp {
    fields: Vec<FieldSpec>,
}

impl StubApp {
    fn new() -> Self {
        Self {
            fields: vec![
                FieldSpec::integer("income", "Income", 0, Some(10_000), 100, 5_000),
                FieldSpec::text_choice("history", "History", &["Yes", "No"]),
            ],
        }
    }
}

impl FrontEnd for StubApp {
    fn title(&self) -> &str {
        "Stub Predictor"
    }

    fn task(&self) -> LoanTask {
        LoanTask::DefaultRisk
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }
}

struct FixedRates(BTreeMap<String, f64>);

impl RateProvider for FixedRates {
    fn fetch(&self) -> Result<BTreeMap<String, f64>> {
        Ok(self.0.clone())
    }
}

fn run_form(fields: &[FieldSpec], input: &str) -> (Option<Record>, String) {
    let mut reader = Cursor::new(input.as_bytes().to_vec());
    let mut output = Vec::new();
    let record = collect(fields, &mut reader, &mut output).unwrap();
    (record, String::from_utf8(output).unwrap())
}

// ---------------------------------------------------------------------------
// Form engine
// ---------------------------------------------------------------------------

#[test]
fn empty_answers_take_defaults() {
    let fields = StubApp::new().fields;
    let (record, _) = run_form(&fields, "\n\n");
    let record = record.unwrap();
    assert_eq!(record.number("income"), Some(5_000.0));
    assert_eq!(record.get("history"), Some(&Value::from("Yes")));
}

#[test]
fn invalid_answers_reprompt() {
    let fields = vec![FieldSpec::integer("years", "Years", 0, Some(10), 1, 3)];
    let (record, output) = run_form(&fields, "abc\n99\n7\n");
    assert_eq!(record.unwrap().number("years"), Some(7.0));
    assert_eq!(output.matches("try again").count(), 2);
    assert!(output.contains("between 0 and 10"));
}

#[test]
fn numbers_snap_to_step() {
    let fields = vec![
        FieldSpec::float("int_rate", "Interest Rate (%)", 5.0, Some(30.0), 0.1, 13.0),
        FieldSpec::integer("loan_amnt", "Loan Amount", 500, Some(50_000), 500, 15_000),
    ];
    let (record, _) = run_form(&fields, "13.04\n15260\n");
    let record = record.unwrap();
    assert_eq!(record.number("int_rate"), Some(13.0));
    assert_eq!(record.number("loan_amnt"), Some(15_500.0));
}

#[test]
fn choices_accept_index_or_label() {
    let fields = vec![
        FieldSpec::text_choice("Gender", "Gender", &["Male", "Female"]),
        FieldSpec::text_choice("Property_Area", "Property Area", &["Urban", "Rural", "Semiurban"]),
    ];
    let (record, _) = run_form(&fields, "2\nsemiurban\n");
    let record = record.unwrap();
    assert_eq!(record.get("Gender"), Some(&Value::from("Female")));
    assert_eq!(record.get("Property_Area"), Some(&Value::from("Semiurban")));
}

#[test]
fn quit_or_end_of_input_abandons_form() {
    let fields = StubApp::new().fields;
    assert!(run_form(&fields, "q\n").0.is_none());
    assert!(run_form(&fields, "4000\n").0.is_none());
}

// ---------------------------------------------------------------------------
// Currency conversion
// ---------------------------------------------------------------------------

#[test]
fn fallback_rates_convert_usd_to_inr() {
    let rates = resolve_rates(&Offline);
    assert!(!rates.live);
    let converted = rates.convert(100.0, "USD");
    assert!((converted - 100.0 * 97.75 / 1.14).abs() < 1e-9);
    assert_eq!(rates.convert(100.0, "INR"), 100.0);
}

#[test]
fn live_rates_are_used_when_available() {
    let provider = FixedRates(BTreeMap::from([("INR".to_string(), 90.0), ("USD".to_string(), 1.1)]));
    let rates = resolve_rates(&provider);
    assert!(rates.live);
    assert!((rates.factor_to_inr("USD") - 90.0 / 1.1).abs() < 1e-12);
    // no GBP quote: treated as rate 1
    assert!((rates.factor_to_inr("GBP") - 90.0).abs() < 1e-12);
}

#[test]
fn empty_live_response_falls_back() {
    let rates = resolve_rates(&FixedRates(BTreeMap::new()));
    assert_eq!(rates, ConversionRates::fallback());
}

#[test]
fn eligibility_record_is_converted_before_derivation() {
    let app = EligibilityApp::new(ConversionRates::fallback());
    let answers = Record::new()
        .with("currency", "USD")
        .with("Gender", "Male")
        .with("ApplicantIncome", 100.0)
        .with("CoapplicantIncome", 0.0)
        .with("LoanAmount", 10.0)
        .with("Loan_Amount_Term", 360.0)
        .with("Credit_History", 1.0);
    let record = app.build_record(answers).unwrap();
    let factor = 97.75 / 1.14;
    assert!(record.get("currency").is_none());
    assert!((record.number("ApplicantIncome").unwrap() - 100.0 * factor).abs() < 1e-9);
    assert!((record.number("LoanAmount").unwrap() - 10.0 * factor).abs() < 1e-9);
    assert_eq!(record.number("Loan_Amount_Term"), Some(360.0));
    assert_eq!(record.number("Credit_History"), Some(1.0));
}

#[test]
fn eligibility_banner_names_rate_mode() {
    let app = EligibilityApp::new(ConversionRates::fallback());
    let banner = app.banner().join("\n");
    assert!(banner.contains("1 EUR = 1.14 USD"));
    assert!(banner.contains("Using fallback conversion rates"));
}

// ---------------------------------------------------------------------------
// Model cache
// ---------------------------------------------------------------------------

#[test]
fn cache_loads_once_until_invalidated() {
    let (mut cache, calls) = counting_cache();
    assert!(!cache.is_loaded());
    let first = cache.get().unwrap().clone();
    let second = cache.get().unwrap().clone();
    assert_eq!(first, second);
    assert_eq!(calls.get(), 1);
    assert_eq!(cache.load_count(), 1);

    cache.invalidate();
    assert!(!cache.is_loaded());
    cache.get().unwrap();
    assert_eq!(calls.get(), 2);
}

#[test]
fn failed_load_is_not_cached() {
    let mut cache = ModelCache::new(|| anyhow::bail!("no bundle"));
    assert!(cache.get().is_err());
    assert!(!cache.is_loaded());
    assert_eq!(cache.load_count(), 0);
}

// ---------------------------------------------------------------------------
// Session loop
// ---------------------------------------------------------------------------

#[test]
fn session_predicts_until_quit() {
    let (mut cache, calls) = counting_cache();
    let app = StubApp::new();
    let options = SessionOptions {
        explain: true,
        explain_dir: None,
    };
    // form, next, form, quit
    let mut input = Cursor::new(b"\n\n\n8000\nNo\nq\n".to_vec());
    let mut output = Vec::new();
    let n = run_session(&app, &mut cache, &options, &mut input, &mut output).unwrap();
    let output = String::from_utf8(output).unwrap();

    assert_eq!(n, 2);
    assert_eq!(calls.get(), 1);
    assert_eq!(output.matches("Probability of Default").count(), 2);
    assert!(output.contains("Explanation (log-odds)"));
    assert!(output.ends_with("Goodbye.\n"));
}

#[test]
fn session_writes_explanation_pages() {
    let (mut cache, _) = counting_cache();
    let dir = tempfile::tempdir().unwrap();
    let options = SessionOptions {
        explain: false,
        explain_dir: Some(dir.path().to_path_buf()),
    };
    let mut input = Cursor::new(b"\n\n".to_vec());
    let mut output = Vec::new();
    let n = run_session(&StubApp::new(), &mut cache, &options, &mut input, &mut output).unwrap();
    assert_eq!(n, 1);
    let page = std::fs::read_to_string(dir.path().join("explanation_1.html")).unwrap();
    assert!(page.contains("Probability of Default"));
    assert!(page.contains("income"));
}

#[test]
fn same_answers_give_same_prediction() {
    let (mut cache, _) = counting_cache();
    let options = SessionOptions::default();
    let mut first = Vec::new();
    let mut second = Vec::new();
    run_session(&StubApp::new(), &mut cache, &options, &mut Cursor::new(b"3000\nNo\n".to_vec()), &mut first).unwrap();
    run_session(&StubApp::new(), &mut cache, &options, &mut Cursor::new(b"3000\nNo\n".to_vec()), &mut second).unwrap();
    assert_eq!(first, second);
}
