//! Cleaning of the raw Lending Club export and post-load normalisation.
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::data_handling::{Column, Table};
use crate::io::{read_table_with, ReadOptions, RowFilter};

pub const STATUS_COLUMN: &str = "loan_status";
pub const TARGET_COLUMN: &str = "target";
pub const FULLY_PAID: &str = "Fully Paid";
pub const CHARGED_OFF: &str = "Charged Off";

/// Feature columns kept from the raw export, in output order.
pub const LENDING_CLUB_FEATURES: [&str; 11] = [
    "loan_amnt",
    "term",
    "int_rate",
    "grade",
    "emp_length",
    "annual_inc",
    "dti",
    "fico_range_low",
    "inq_last_6mths",
    "open_acc",
    "pub_rec",
];

/// Settings for [`prepare_lending_club`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrepareConfig {
    pub sample_size: usize,
    pub seed: u64,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            sample_size: 200_000,
            seed: 42,
        }
    }
}

/// How much the loader should repair after reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Re-coerce `term` and `emp_length` when they are still textual.
    CoerceText,
    None,
}

fn digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"(\d+)").expect("static regex"))
}

/// First run of digits in `text`, e.g. `" 36 months"` -> 36, `"10+ years"` -> 10.
pub fn extract_leading_number(text: &str) -> Option<f64> {
    digits()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Coerce a text column of embedded numbers. Cells without digits become
/// `fill` (or stay missing when `fill` is `None`). Numeric columns pass through.
pub fn coerce_embedded_number(column: &Column, fill: Option<f64>) -> Column {
    match column {
        Column::Numeric(_) => column.clone(),
        Column::Text(cells) => Column::Numeric(
            cells
                .iter()
                .map(|cell| match cell {
                    Some(text) => extract_leading_number(text).or(fill),
                    None => fill,
                })
                .collect(),
        ),
    }
}

/// Turn raw rows into the cleaned dataset.
///
/// Rows in a terminal state are kept, labelled (`Charged Off` -> 1), reduced
/// to the fixed feature list plus `target`, stripped of incomplete rows,
/// coerced and finally subsampled with a seeded RNG.
pub fn prepare_lending_club(raw: &Table, config: &PrepareConfig) -> Result<Table> {
    let mut required: Vec<&str> = vec![STATUS_COLUMN];
    required.extend_from_slice(&LENDING_CLUB_FEATURES);
    let missing = raw.missing_columns(&required);
    if !missing.is_empty() {
        anyhow::bail!("Raw dataset is missing required columns: {}", missing.join(", "));
    }

    let status = match raw.column(STATUS_COLUMN) {
        Some(Column::Text(cells)) => cells.clone(),
        // an empty or all-numeric status column holds no terminal states
        Some(Column::Numeric(cells)) => vec![None; cells.len()],
        None => anyhow::bail!("Raw dataset is missing required columns: {}", STATUS_COLUMN),
    };
    let is_terminal = |row: usize| {
        matches!(status[row].as_deref().map(str::trim), Some(FULLY_PAID) | Some(CHARGED_OFF))
    };
    let kept_rows: Vec<usize> = (0..raw.n_rows()).filter(|&i| is_terminal(i)).collect();
    log::info!(
        "{} of {} rows are in a terminal loan state",
        kept_rows.len(),
        raw.n_rows()
    );

    let target: Vec<Option<f64>> = kept_rows
        .iter()
        .map(|&i| Some(if status[i].as_deref().map(str::trim) == Some(CHARGED_OFF) { 1.0 } else { 0.0 }))
        .collect();
    let mut table = raw.select(&LENDING_CLUB_FEATURES)?.take_rows(&kept_rows);
    table.push_column(TARGET_COLUMN, Column::Numeric(target))?;

    let before = table.n_rows();
    let mut table = table.drop_missing();
    log::info!("dropped {} rows with missing values", before - table.n_rows());

    if let Some(term) = table.column("term") {
        let coerced = coerce_embedded_number(term, None);
        table.push_column("term", coerced)?;
    }
    if let Some(emp_length) = table.column("emp_length") {
        let coerced = coerce_embedded_number(emp_length, Some(0.0));
        table.push_column("emp_length", coerced)?;
    }
    // term cells without digits are unusable
    let table = table.drop_missing();

    Ok(subsample(&table, config.sample_size, config.seed))
}

/// Deterministic subsample without replacement. Smaller tables are returned whole.
pub fn subsample(table: &Table, n: usize, seed: u64) -> Table {
    if table.n_rows() <= n {
        if table.n_rows() < n {
            log::warn!(
                "requested a sample of {} rows but only {} are available; keeping all",
                n,
                table.n_rows()
            );
        }
        return table.clone();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let rows = rand::seq::index::sample(&mut rng, table.n_rows(), n).into_vec();
    table.take_rows(&rows)
}

/// Read the raw export, clean it and return the cleaned table.
///
/// Only the needed columns are loaded and non-terminal rows are discarded
/// while streaming. A missing file is an error here.
pub fn prepare_from_path<P: AsRef<Path>>(raw_path: P, config: &PrepareConfig) -> Result<Table> {
    let raw_path = raw_path.as_ref();
    let mut columns: Vec<String> = vec![STATUS_COLUMN.to_string()];
    columns.extend(LENDING_CLUB_FEATURES.iter().map(|c| c.to_string()));
    let options = ReadOptions {
        columns: Some(columns),
        row_filter: Some(RowFilter {
            column: STATUS_COLUMN.to_string(),
            allowed: vec![FULLY_PAID.to_string(), CHARGED_OFF.to_string()],
        }),
    };
    let raw = read_table_with(raw_path, &options)?
        .with_context(|| format!("Raw dataset not found: {}", raw_path.display()))?;
    prepare_lending_club(&raw, config)
}

/// Repairs applied by the normalising loader.
pub fn normalize_loaded(table: &mut Table) -> Result<()> {
    if let Some(term) = table.column("term").filter(|c| c.is_text()) {
        log::debug!("coercing textual 'term' column");
        let coerced = coerce_embedded_number(term, None);
        table.push_column("term", coerced)?;
    }
    if let Some(emp_length) = table.column("emp_length").filter(|c| c.is_text()) {
        log::debug!("coercing textual 'emp_length' column");
        let coerced = coerce_embedded_number(emp_length, Some(0.0));
        table.push_column("emp_length", coerced)?;
    }
    Ok(())
}

/// Load a raw or cleaned dataset.
///
/// `Ok(None)` means the file does not exist; every caller receives the same
/// contract and must decide what absence means for it.
pub fn load_dataset<P: AsRef<Path>>(path: P, normalization: Normalization) -> Result<Option<Table>> {
    let Some(mut table) = crate::io::read_table(&path)? else {
        return Ok(None);
    };
    if normalization == Normalization::CoerceText {
        normalize_loaded(&mut table)?;
    }
    Ok(Some(table))
}
