//! `loanrisk prepare`: clean the raw Lending Club export.
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use loanrisk_classifiers::data_handling::Column;
use loanrisk_classifiers::io::write_table;
use loanrisk_classifiers::preprocessing::{prepare_from_path, PrepareConfig, TARGET_COLUMN};

use crate::util::{optional_arg, validate_tsv_or_csv_file};

pub const DEFAULT_CLEAN_PATH: &str = "data/lending_club_clean.csv";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareParams {
    pub raw_path: PathBuf,
    pub output_path: PathBuf,
    pub prepare: PrepareConfig,
}

impl PrepareParams {
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let raw_path: &PathBuf = matches
            .get_one("raw")
            .context("A raw dataset path is required")?;
        let mut prepare = PrepareConfig::default();
        if let Some(sample_size) = optional_arg::<usize>(matches, "sample_size") {
            prepare.sample_size = *sample_size;
        }
        if let Some(seed) = optional_arg::<u64>(matches, "seed") {
            prepare.seed = *seed;
        }
        let output_path = optional_arg::<PathBuf>(matches, "output_file")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLEAN_PATH));
        Ok(Self {
            raw_path: raw_path.clone(),
            output_path,
            prepare,
        })
    }
}

/// Summary of a finished preparation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareSummary {
    pub n_rows: usize,
    pub n_charged_off: usize,
}

pub fn run_prepare(params: &PrepareParams) -> Result<PrepareSummary> {
    validate_tsv_or_csv_file(&params.raw_path.to_string_lossy())?;
    let start = Instant::now();
    let cleaned = prepare_from_path(&params.raw_path, &params.prepare)
        .with_context(|| format!("Failed to prepare {}", params.raw_path.display()))?;

    let n_charged_off = match cleaned.column(TARGET_COLUMN) {
        Some(Column::Numeric(cells)) => cells.iter().filter(|c| **c == Some(1.0)).count(),
        _ => 0,
    };
    write_table(&cleaned, &params.output_path)?;
    log::info!(
        "cleaned dataset: {} rows ({} charged off) written to {} in {:?}",
        cleaned.n_rows(),
        n_charged_off,
        params.output_path.display(),
        start.elapsed()
    );
    Ok(PrepareSummary {
        n_rows: cleaned.n_rows(),
        n_charged_off,
    })
}
