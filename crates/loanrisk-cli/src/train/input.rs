use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use loanrisk_classifiers::config::{BootstrapConfig, ModelConfig};
use loanrisk_classifiers::task::LoanTask;

use crate::util::{load_json, optional_arg, validate_tsv_or_csv_file};

/// Settings shared by the `train`, `evaluate` and `explain` stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    pub version: String,
    pub task: LoanTask,
    pub data_path: String,
    /// Model bundle directory; `models/<task>` when unset.
    pub output_dir: Option<String>,
    pub test_size: f64,
    pub seed: u64,
    pub model: ModelConfig,
    pub bootstrap: BootstrapConfig,
    /// Rows drawn from the test partition for the global attribution summary.
    pub explain_sample_size: usize,
    pub shap_summary: String,
    pub report: String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            version: clap::crate_version!().to_string(),
            task: LoanTask::DefaultRisk,
            data_path: String::from("data/lending_club_clean.csv"),
            output_dir: None,
            test_size: 0.2,
            seed: 42,
            model: ModelConfig::default(),
            bootstrap: BootstrapConfig::default(),
            explain_sample_size: 1000,
            shap_summary: String::from("shap_summary.svg"),
            report: String::from("loanrisk_trainer_report.html"),
        }
    }
}

impl TrainConfig {
    /// Load the JSON configuration (or the defaults) and apply CLI overrides.
    pub fn from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<Self> {
        let mut config: TrainConfig = match config_path {
            Some(path) => load_json(path).with_context(|| format!("Invalid training configuration: {:?}", path))?,
            None => TrainConfig::default(),
        };

        // Apply CLI overrides
        if let Some(task) = optional_arg::<String>(matches, "task") {
            config.task = task.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(data) = optional_arg::<String>(matches, "data") {
            config.data_path = data.clone();
        }
        validate_tsv_or_csv_file(&config.data_path)?;

        if let Some(model_dir) = optional_arg::<String>(matches, "model_dir") {
            config.output_dir = Some(model_dir.clone());
        }
        if let Some(rounds) = optional_arg::<usize>(matches, "rounds") {
            config.model.num_boost_round = *rounds;
        }
        if let Some(iterations) = optional_arg::<usize>(matches, "bootstrap_iterations") {
            config.bootstrap.n_iterations = *iterations;
        }
        if let Some(sample_size) = optional_arg::<usize>(matches, "sample_size") {
            config.explain_sample_size = *sample_size;
        }
        if let Some(summary) = optional_arg::<String>(matches, "shap_summary") {
            config.shap_summary = summary.clone();
        }
        if let Some(report) = optional_arg::<String>(matches, "report") {
            config.report = report.clone();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            anyhow::bail!("test_size must lie in (0, 1), got {}", self.test_size);
        }
        if self.explain_sample_size == 0 {
            anyhow::bail!("explain_sample_size must be at least 1");
        }
        self.model.validate()
    }

    pub fn model_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from("models").join(self.task.to_string()),
        }
    }
}
