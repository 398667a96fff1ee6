//! `loanrisk explain`: global attribution summary of a persisted model.
use anyhow::Result;

use loanrisk_classifiers::artifacts::ModelBundle;

use crate::train::input::TrainConfig;
use crate::train::trainer::{feature_table, load_required, summarize_attributions};

pub fn run_explain(config: &TrainConfig) -> Result<Vec<(String, f64)>> {
    let bundle = ModelBundle::load(config.model_dir())?;
    let table = load_required(config)?;
    let features = feature_table(config.task, &table)?;
    let x = bundle.encode(&features)?;
    summarize_attributions(config, &bundle, &x)
}
