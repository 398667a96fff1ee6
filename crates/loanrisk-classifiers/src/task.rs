//! The two prediction tasks served by the pipeline.
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data_handling::{Column, Record, Table};
use crate::features::{derive_record, derive_table};

/// Which dataset / label definition is being modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoanTask {
    /// Lending Club default prediction on the cleaned dataset (`target`, 1 = charged off).
    #[default]
    DefaultRisk,
    /// Loan eligibility on the loan-prediction dataset (`Loan_Status`, `Y` = 1).
    Eligibility,
}

/// Features and labels ready for encoding.
#[derive(Debug, Clone)]
pub struct LabeledTable {
    pub features: Table,
    pub labels: Vec<i32>,
}

impl LoanTask {
    pub fn target_column(&self) -> &'static str {
        match self {
            LoanTask::DefaultRisk => "target",
            LoanTask::Eligibility => "Loan_Status",
        }
    }

    /// Identifier columns that never become features.
    pub fn ignored_columns(&self) -> &'static [&'static str] {
        match self {
            LoanTask::DefaultRisk => &[],
            LoanTask::Eligibility => &["Loan_ID"],
        }
    }

    pub fn positive_label_name(&self) -> &'static str {
        match self {
            LoanTask::DefaultRisk => "default",
            LoanTask::Eligibility => "approved",
        }
    }

    pub fn derives_features(&self) -> bool {
        matches!(self, LoanTask::Eligibility)
    }

    /// Task-specific feature engineering shared by training and inference.
    pub fn prepare_table(&self, table: &mut Table) -> Result<()> {
        if self.derives_features() {
            derive_table(table)?;
        }
        Ok(())
    }

    pub fn prepare_record(&self, record: &mut Record) {
        if self.derives_features() {
            derive_record(record);
        }
    }

    fn label_of_text(&self, text: &str) -> Option<i32> {
        match text.trim() {
            "Y" | "Yes" | "1" => Some(1),
            "N" | "No" | "0" => Some(0),
            _ => None,
        }
    }

    /// Split a loaded table into features and binary labels. Rows with a
    /// missing or unrecognised label are dropped.
    pub fn split_labels(&self, table: &Table) -> Result<LabeledTable> {
        let target = self.target_column();
        let labels: Vec<Option<i32>> = match table.column(target) {
            Some(Column::Numeric(cells)) => cells
                .iter()
                .map(|c| match c {
                    Some(v) if *v == 1.0 => Some(1),
                    Some(v) if *v == 0.0 => Some(0),
                    _ => None,
                })
                .collect(),
            Some(Column::Text(cells)) => cells
                .iter()
                .map(|c| c.as_deref().and_then(|s| self.label_of_text(s)))
                .collect(),
            None => anyhow::bail!("Dataset has no label column '{}'", target),
        };

        let rows: Vec<usize> = (0..labels.len()).filter(|&i| labels[i].is_some()).collect();
        if rows.len() < labels.len() {
            log::warn!(
                "dropping {} rows without a usable '{}' label",
                labels.len() - rows.len(),
                target
            );
        }
        let mut features = table.take_rows(&rows);
        features.remove_column(target);
        for ignored in self.ignored_columns() {
            features.remove_column(ignored);
        }
        self.prepare_table(&mut features)?;
        let labels = rows.iter().filter_map(|&i| labels[i]).collect();
        Ok(LabeledTable { features, labels })
    }
}

impl fmt::Display for LoanTask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoanTask::DefaultRisk => write!(f, "default_risk"),
            LoanTask::Eligibility => write!(f, "eligibility"),
        }
    }
}

impl FromStr for LoanTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "default_risk" => Ok(LoanTask::DefaultRisk),
            "eligibility" => Ok(LoanTask::Eligibility),
            _ => Err(format!(
                "Unknown task: {}. Expected 'default_risk' or 'eligibility'",
                s
            )),
        }
    }
}
