use anyhow::Result;

use loanrisk_classifiers::data_handling::{Record, Value};
use loanrisk_classifiers::features::{APPLICANT_INCOME, COAPPLICANT_INCOME, LOAN_AMOUNT, LOAN_AMOUNT_TERM};
use loanrisk_classifiers::task::LoanTask;

use super::currency::{ConversionRates, CURRENCIES};
use super::form::FieldSpec;
use super::FrontEnd;

const CURRENCY_FIELD: &str = "currency";
/// Inputs entered in the chosen currency and converted before derivation.
const MONETARY_FIELDS: [&str; 3] = [APPLICANT_INCOME, COAPPLICANT_INCOME, LOAN_AMOUNT];

/// Loan eligibility predictor with currency conversion.
pub struct EligibilityApp {
    fields: Vec<FieldSpec>,
    rates: ConversionRates,
}

impl EligibilityApp {
    pub fn new(rates: ConversionRates) -> Self {
        let fields = vec![
            FieldSpec::text_choice(CURRENCY_FIELD, "Currency", &CURRENCIES),
            FieldSpec::text_choice("Gender", "Gender", &["Male", "Female"]),
            FieldSpec::text_choice("Married", "Married", &["Yes", "No"]),
            FieldSpec::text_choice("Education", "Education", &["Graduate", "Not Graduate"]),
            FieldSpec::text_choice("Self_Employed", "Self Employed", &["Yes", "No"]),
            FieldSpec::text_choice("Property_Area", "Property Area", &["Urban", "Rural", "Semiurban"]),
            FieldSpec::integer(APPLICANT_INCOME, "Applicant's Monthly Income", 0, None, 1, 5_000),
            FieldSpec::integer(COAPPLICANT_INCOME, "Co-applicant's Monthly Income", 0, None, 1, 2_000),
            FieldSpec::integer(LOAN_AMOUNT, "Loan Amount", 0, None, 1, 150),
            FieldSpec::integer(LOAN_AMOUNT_TERM, "Loan Term (in months)", 1, None, 1, 360),
            FieldSpec::choice(
                "Credit_History",
                "Credit History",
                vec![
                    ("Yes".to_string(), Value::Number(1.0)),
                    ("No".to_string(), Value::Number(0.0)),
                ],
            ),
        ];
        Self { fields, rates }
    }

    pub fn rates(&self) -> &ConversionRates {
        &self.rates
    }
}

impl FrontEnd for EligibilityApp {
    fn title(&self) -> &str {
        "Loan Eligibility Predictor"
    }

    fn task(&self) -> LoanTask {
        LoanTask::Eligibility
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn banner(&self) -> Vec<String> {
        self.rates.describe()
    }

    /// Drop the currency answer and convert monetary amounts to INR.
    fn build_record(&self, answers: Record) -> Result<Record> {
        let currency = match answers.get(CURRENCY_FIELD) {
            Some(Value::Text(currency)) => currency.clone(),
            _ => anyhow::bail!("No currency selected"),
        };
        let factor = self.rates.factor_to_inr(&currency);
        log::debug!("converting {} amounts to INR with factor {:.4}", currency, factor);

        let mut record = Record::new();
        for (name, value) in answers.iter().filter(|(name, _)| *name != CURRENCY_FIELD) {
            let value = match (MONETARY_FIELDS.contains(&name), value.as_number()) {
                (true, Some(amount)) => Value::Number(amount * factor),
                _ => value.clone(),
            };
            record.insert(name, value);
        }
        Ok(record)
    }
}
