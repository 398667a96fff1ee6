use std::time::Instant;

use anyhow::{Context, Result};
use maud::html;
use ndarray::{Array2, Axis};

use loanrisk_classifiers::artifacts::ModelBundle;
use loanrisk_classifiers::data_handling::{stratified_split, Table};
use loanrisk_classifiers::evaluation::{evaluate_with_bootstrap, EvaluationReport};
use loanrisk_classifiers::explain::{global_importance, sample_rows};
use loanrisk_classifiers::models::{ClassifierModel, XGBoostClassifier};
use loanrisk_classifiers::preprocessing::{load_dataset, Normalization};
use loanrisk_classifiers::report::plots::{
    plot_bootstrap_histogram, plot_global_importance, plot_pr_curve, plot_roc_curve,
};
use loanrisk_classifiers::report::report::{key_value_table, write_report, Report, ReportSection};
use loanrisk_classifiers::report::svg::write_importance_svg;
use loanrisk_classifiers::schema::FeatureSchema;
use loanrisk_classifiers::stats::{precision_recall_curve, roc_curve};
use loanrisk_classifiers::task::LoanTask;

use super::input::TrainConfig;
use crate::util::write_bytes_to_file;

pub const CONFIG_FILE: &str = "train_config.json";

/// Everything a training run produced.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub bundle: ModelBundle,
    pub evaluation: EvaluationReport,
    /// Mean |attribution| per feature on the explained sample, sorted descending.
    pub importance: Vec<(String, f64)>,
}

/// Encoded train/test partitions.
pub(crate) struct Partitions {
    pub x_train: Array2<f32>,
    pub y_train: Vec<i32>,
    pub x_test: Array2<f32>,
    pub y_test: Vec<i32>,
}

impl Partitions {
    pub(crate) fn split(x: &Array2<f32>, labels: &[i32], test_size: f64, seed: u64) -> Result<Self> {
        let (train, test) = stratified_split(labels, test_size, seed)?;
        if test.is_empty() || train.is_empty() {
            anyhow::bail!(
                "Dataset with {} labelled rows is too small for a {} test split",
                labels.len(),
                test_size
            );
        }
        Ok(Self {
            x_train: x.select(Axis(0), &train),
            y_train: train.iter().map(|&i| labels[i]).collect(),
            x_test: x.select(Axis(0), &test),
            y_test: test.iter().map(|&i| labels[i]).collect(),
        })
    }
}

/// Load the dataset a batch stage cannot run without.
pub(crate) fn load_required(config: &TrainConfig) -> Result<Table> {
    let table = load_dataset(&config.data_path, Normalization::CoerceText)?
        .with_context(|| format!("Dataset not found: {}", config.data_path))?;
    log::info!(
        "Loaded {} rows x {} columns from {}",
        table.n_rows(),
        table.n_columns(),
        config.data_path
    );
    Ok(table)
}

/// Feature columns of a table that may or may not carry labels.
pub(crate) fn feature_table(task: LoanTask, table: &Table) -> Result<Table> {
    if table.has_column(task.target_column()) {
        return Ok(task.split_labels(table)?.features);
    }
    let mut features = table.clone();
    for ignored in task.ignored_columns() {
        features.remove_column(ignored);
    }
    task.prepare_table(&mut features)?;
    Ok(features)
}

pub fn run_training(config: &TrainConfig) -> Result<TrainingOutcome> {
    let table = load_required(config)?;
    let labeled = config.task.split_labels(&table)?;
    let schema = FeatureSchema::infer(&labeled.features)?;
    log::info!(
        "Feature schema: {} columns ({} categorical: {:?})",
        schema.len(),
        schema.categorical_names().len(),
        schema.categorical_names()
    );
    let x = schema.encode_table(&labeled.features)?;
    let parts = Partitions::split(&x, &labeled.labels, config.test_size, config.seed)?;
    log::info!(
        "Split into {} training and {} test rows",
        parts.y_train.len(),
        parts.y_test.len()
    );

    let start_time = Instant::now();
    log::trace!("Training started");
    let mut model = XGBoostClassifier::new(config.model.clone());
    model
        .fit(&parts.x_train, &parts.y_train)
        .with_context(|| "Training failed: an error occurred while fitting the boosted trees")?;
    log::info!("Training completed in {:?}", start_time.elapsed());

    let evaluation = evaluate_with_bootstrap(&model, &parts.x_test, &parts.y_test, &config.bootstrap)
        .context("Evaluation on the test partition failed")?;

    let bundle = ModelBundle::new(model, schema)?;
    let model_dir = config.model_dir();
    bundle.save(&model_dir)?;
    log::info!("Model saved to: {}", model_dir.display());

    let importance = summarize_attributions(config, &bundle, &parts.x_test)?;
    write_training_report(config, &bundle, &evaluation, &parts, &importance)?;

    // Save configuration next to the model
    let bytes = serde_json::to_vec_pretty(config)?;
    write_bytes_to_file(model_dir.join(CONFIG_FILE), &bytes)?;

    Ok(TrainingOutcome {
        bundle,
        evaluation,
        importance,
    })
}

/// Re-score the persisted model on the same held-out partition it was trained against.
pub fn run_evaluation(config: &TrainConfig) -> Result<EvaluationReport> {
    let bundle = ModelBundle::load(config.model_dir())?;
    let table = load_required(config)?;
    let labeled = config.task.split_labels(&table)?;
    let x = bundle.encode(&labeled.features)?;
    let parts = Partitions::split(&x, &labeled.labels, config.test_size, config.seed)?;
    log::info!("Evaluating on {} held-out rows", parts.y_test.len());
    evaluate_with_bootstrap(&bundle.model, &parts.x_test, &parts.y_test, &config.bootstrap)
}

/// Global attribution summary over a seeded sample of `x`, also written as SVG.
pub(crate) fn summarize_attributions(
    config: &TrainConfig,
    bundle: &ModelBundle,
    x: &Array2<f32>,
) -> Result<Vec<(String, f64)>> {
    let rows = sample_rows(x.nrows(), config.explain_sample_size, config.seed);
    let sample = x.select(Axis(0), &rows);
    let start = Instant::now();
    let importance = global_importance(&bundle.model, &bundle.schema, &sample)?;
    log::debug!("attributions for {} rows computed in {:?}", rows.len(), start.elapsed());
    write_importance_svg(&importance, &config.shap_summary)?;
    Ok(importance)
}

fn write_training_report(
    config: &TrainConfig,
    bundle: &ModelBundle,
    evaluation: &EvaluationReport,
    parts: &Partitions,
    importance: &[(String, f64)],
) -> Result<()> {
    let mut report = Report::new(
        "loanrisk",
        &config.version,
        None,
        &format!("loanrisk {} Trainer Report", config.task),
    );

    /* Section 1: Metrics */
    {
        let mut metrics_section = ReportSection::new("Metrics");
        metrics_section.add_content(html! {
            "Hold-out performance of the gradient-boosted classifier. The confidence interval is the 2.5th to 97.5th percentile of the ROC-AUC over bootstrap resamples of the test partition."
        });
        let metrics = &evaluation.metrics;
        let bootstrap = &evaluation.bootstrap;
        metrics_section.add_content(key_value_table(&[
            ("ROC-AUC".to_string(), format!("{:.4}", metrics.roc_auc)),
            ("PR-AUC".to_string(), format!("{:.4}", metrics.pr_auc)),
            ("F1 Score".to_string(), format!("{:.4}", metrics.f1)),
            (
                "Bootstrapped ROC-AUC".to_string(),
                format!(
                    "{:.4} ± {:.4} (95% CI: {:.4}-{:.4})",
                    bootstrap.mean, bootstrap.std_dev, bootstrap.ci_lower, bootstrap.ci_upper
                ),
            ),
            (
                "Skipped resamples".to_string(),
                format!("{} of {}", bootstrap.n_degenerate, bootstrap.n_iterations),
            ),
            ("Training rows".to_string(), parts.y_train.len().to_string()),
            (
                "Test rows (positive)".to_string(),
                format!("{} ({})", metrics.n_samples, metrics.n_positive),
            ),
            ("Trees".to_string(), bundle.model.n_trees().to_string()),
        ]));

        let probabilities = bundle.model.predict_proba(&parts.x_test)?;
        let roc = roc_curve(&parts.y_test, &probabilities)?;
        metrics_section.add_plot(plot_roc_curve(&roc, metrics.roc_auc));
        let pr = precision_recall_curve(&parts.y_test, &probabilities)?;
        metrics_section.add_plot(plot_pr_curve(&pr, metrics.pr_auc));
        metrics_section.add_plot(plot_bootstrap_histogram(
            &bootstrap.aucs,
            bootstrap.ci_lower,
            bootstrap.ci_upper,
        ));
        report.add_section(metrics_section);
    }

    /* Section 2: Feature attributions */
    {
        let mut attribution_section = ReportSection::new("Feature attributions");
        attribution_section.add_plot(plot_global_importance(importance));
        let gain: Vec<(String, String)> = bundle
            .schema
            .names()
            .into_iter()
            .zip(bundle.model.feature_importance())
            .map(|(name, gain)| (name.to_string(), format!("{:.4}", gain)))
            .collect();
        attribution_section.add_content(html! { h3 { "Split gain share" } });
        attribution_section.add_content(key_value_table(&gain));
        report.add_section(attribution_section);
    }

    /* Section 3: Configuration */
    {
        let mut config_section = ReportSection::new("Configuration");
        config_section.add_content(html! {
            style {
                ".code-container {
                    background-color: #f5f5f5;
                    padding: 10px;
                    border-radius: 5px;
                    overflow-x: auto;
                    font-family: monospace;
                    white-space: pre-wrap;
                }"
            }
            div class="code-container" {
                pre {
                    code { (serde_json::to_string_pretty(config)?) }
                }
            }
        });
        report.add_section(config_section);
    }

    write_report(&report, &config.report)
}
