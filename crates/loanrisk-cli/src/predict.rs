//! `loanrisk predict`: score one applicant record from a JSON file.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use maud::html;

use loanrisk_classifiers::artifacts::{ModelBundle, Prediction};
use loanrisk_classifiers::data_handling::Record;
use loanrisk_classifiers::explain::Attribution;
use loanrisk_classifiers::report::plots::{plot_force, with_transient_html};
use loanrisk_classifiers::report::report::{key_value_table, write_report, Report, ReportSection};
use loanrisk_classifiers::task::LoanTask;

use crate::util::load_json;

/// Contributions shown individually in force plots; the rest are pooled.
pub const FORCE_PLOT_TOP_K: usize = 10;

#[derive(Debug, Clone)]
pub struct PredictParams {
    pub task: LoanTask,
    pub model_dir: PathBuf,
    pub record_path: PathBuf,
    pub explain_path: Option<PathBuf>,
}

/// Human-readable verdict for a scored record.
pub fn verdict(task: LoanTask, prediction: &Prediction) -> String {
    let percent = prediction.probability * 100.0;
    match task {
        LoanTask::Eligibility if prediction.label == 1 => {
            format!("Loan Approved ({:.2}% probability)", percent)
        }
        LoanTask::Eligibility => format!("Loan Not Approved ({:.2}% probability)", percent),
        LoanTask::DefaultRisk => format!(
            "Probability of Default: {:.2}% ({})",
            percent,
            if prediction.label == 1 { "likely to default" } else { "likely to repay" }
        ),
    }
}

/// Read a raw applicant record: a flat JSON object of numbers, strings and nulls.
pub fn read_record<P: AsRef<Path>>(path: P) -> Result<Record> {
    let object: BTreeMap<String, serde_json::Value> = load_json(&path)?;
    Record::from_json_object(&object)
        .with_context(|| format!("Invalid applicant record in {}", path.as_ref().display()))
}

/// Derive task features, then score.
pub fn score_record(task: LoanTask, bundle: &ModelBundle, mut record: Record) -> Result<(Record, Prediction)> {
    task.prepare_record(&mut record);
    let missing = bundle.schema.missing_from(&record);
    if !missing.is_empty() {
        log::warn!("input lacks {} model columns, filled with defaults: {:?}", missing.len(), missing);
    }
    let prediction = bundle.predict_record(&record)?;
    Ok((record, prediction))
}

/// Standalone HTML page with the verdict and the force plot of one record.
pub fn write_explanation_page<P: AsRef<Path>>(
    task: LoanTask,
    prediction: &Prediction,
    attribution: &Attribution,
    path: P,
) -> Result<()> {
    let plot = plot_force(attribution, FORCE_PLOT_TOP_K);
    let mut report = Report::new(
        "loanrisk",
        clap::crate_version!(),
        None,
        &format!("loanrisk {} Explanation", task),
    );
    let mut section = ReportSection::new("Prediction");
    section.add_content(html! { p { strong { (verdict(task, prediction)) } } });
    with_transient_html(&plot, |markup| {
        section.add_content(html! {
            iframe srcdoc=(markup) width="100%" height="520" style="border: none;" {}
        });
        Ok(())
    })?;
    section.add_content(key_value_table(
        &attribution
            .ranked()
            .into_iter()
            .map(|(name, value)| (name, format!("{:+.4}", value)))
            .collect::<Vec<_>>(),
    ));
    section.add_content(html! {
        p { "base value " (format!("{:.4}", attribution.base_value)) " + contributions = " (format!("{:.4}", attribution.reconstructed())) }
    });
    report.add_section(section);
    write_report(&report, path)
}

pub fn run_predict(params: &PredictParams) -> Result<Prediction> {
    let bundle = ModelBundle::load(&params.model_dir)?;
    let record = read_record(&params.record_path)?;
    let (record, prediction) = score_record(params.task, &bundle, record)?;
    if let Some(path) = &params.explain_path {
        let attribution = bundle.explain_record(&record)?;
        write_explanation_page(params.task, &prediction, &attribution, path)?;
    }
    Ok(prediction)
}
