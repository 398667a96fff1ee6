//! Affordability features derived from income and loan terms.
//!
//! Training and inference go through [`derive`], so a record scored by a
//! front-end sees exactly the transformation the training rows saw. Zero or
//! missing denominators produce the missing marker (`None`, encoded as NaN),
//! never an error and never an infinity.
use anyhow::Result;

use crate::data_handling::{Column, Record, Table};

pub const APPLICANT_INCOME: &str = "ApplicantIncome";
pub const COAPPLICANT_INCOME: &str = "CoapplicantIncome";
pub const LOAN_AMOUNT: &str = "LoanAmount";
pub const LOAN_AMOUNT_TERM: &str = "Loan_Amount_Term";

pub const TOTAL_INCOME: &str = "Total_Income";
pub const EMI: &str = "EMI";
pub const EMI_TO_INCOME_RATIO: &str = "EMI_to_Income_Ratio";

/// Output of the deriver for one applicant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFeatures {
    pub total_income: Option<f64>,
    pub emi: Option<f64>,
    pub emi_to_income_ratio: Option<f64>,
}

fn safe_ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 && d.is_finite() && n.is_finite() => Some(n / d),
        _ => None,
    }
}

pub fn derive(
    applicant_income: Option<f64>,
    coapplicant_income: Option<f64>,
    loan_amount: Option<f64>,
    loan_term: Option<f64>,
) -> DerivedFeatures {
    let total_income = match (applicant_income, coapplicant_income) {
        (Some(a), Some(c)) => Some(a + c),
        _ => None,
    };
    let emi = safe_ratio(loan_amount, loan_term);
    let emi_to_income_ratio = safe_ratio(emi, total_income);
    DerivedFeatures {
        total_income,
        emi,
        emi_to_income_ratio,
    }
}

/// Add the derived columns to a record in place.
pub fn derive_record(record: &mut Record) {
    let derived = derive(
        record.number(APPLICANT_INCOME),
        record.number(COAPPLICANT_INCOME),
        record.number(LOAN_AMOUNT),
        record.number(LOAN_AMOUNT_TERM),
    );
    record.insert(TOTAL_INCOME, derived.total_income);
    record.insert(EMI, derived.emi);
    record.insert(EMI_TO_INCOME_RATIO, derived.emi_to_income_ratio);
}

fn numeric_cells(table: &Table, name: &str) -> Vec<Option<f64>> {
    match table.column(name) {
        Some(Column::Numeric(v)) => v.clone(),
        Some(Column::Text(v)) => v
            .iter()
            .map(|c| c.as_ref().and_then(|s| s.trim().parse::<f64>().ok()))
            .collect(),
        None => vec![None; table.n_rows()],
    }
}

/// Add the derived columns to every row of a table.
pub fn derive_table(table: &mut Table) -> Result<()> {
    let applicant = numeric_cells(table, APPLICANT_INCOME);
    let coapplicant = numeric_cells(table, COAPPLICANT_INCOME);
    let amount = numeric_cells(table, LOAN_AMOUNT);
    let term = numeric_cells(table, LOAN_AMOUNT_TERM);

    let derived: Vec<DerivedFeatures> = (0..table.n_rows())
        .map(|i| derive(applicant[i], coapplicant[i], amount[i], term[i]))
        .collect();
    table.push_column(
        TOTAL_INCOME,
        Column::Numeric(derived.iter().map(|d| d.total_income).collect()),
    )?;
    table.push_column(EMI, Column::Numeric(derived.iter().map(|d| d.emi).collect()))?;
    table.push_column(
        EMI_TO_INCOME_RATIO,
        Column::Numeric(derived.iter().map(|d| d.emi_to_income_ratio).collect()),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_term_and_zero_income_are_missing() {
        let d = derive(Some(0.0), Some(0.0), Some(100.0), Some(0.0));
        assert_eq!(d.total_income, Some(0.0));
        assert_eq!(d.emi, None);
        assert_eq!(d.emi_to_income_ratio, None);

        let d = derive(Some(0.0), Some(0.0), Some(100.0), Some(10.0));
        assert_eq!(d.emi, Some(10.0));
        assert_eq!(d.emi_to_income_ratio, None);
    }
}
