use loanrisk_classifiers::data_handling::Value;
use loanrisk_classifiers::task::LoanTask;

use super::form::FieldSpec;
use super::FrontEnd;

/// Probability-of-default predictor over the cleaned Lending Club features.
pub struct DefaultRiskApp {
    fields: Vec<FieldSpec>,
}

impl DefaultRiskApp {
    pub fn new() -> Self {
        let grades: Vec<&str> = vec!["A", "B", "C", "D", "E", "F", "G"];
        let fields = vec![
            FieldSpec::integer("loan_amnt", "Loan Amount", 500, Some(50_000), 500, 15_000),
            FieldSpec::choice(
                "term",
                "Loan Term (months)",
                vec![
                    ("36".to_string(), Value::Number(36.0)),
                    ("60".to_string(), Value::Number(60.0)),
                ],
            ),
            FieldSpec::float("int_rate", "Interest Rate (%)", 5.0, Some(30.0), 0.1, 13.0),
            FieldSpec::text_choice("grade", "Credit Grade", &grades),
            FieldSpec::integer("emp_length", "Employment Length (years)", 0, Some(10), 1, 3),
            FieldSpec::integer("annual_inc", "Annual Income", 10_000, Some(500_000), 1_000, 75_000),
            FieldSpec::float("dti", "Debt-to-Income Ratio", 0.0, Some(40.0), 0.1, 18.0),
            FieldSpec::integer("fico_range_low", "FICO Score (Lower Bound)", 600, Some(850), 10, 690),
            FieldSpec::integer("inq_last_6mths", "Credit Inquiries (6 months)", 0, Some(10), 1, 1),
            FieldSpec::integer("open_acc", "Open Credit Accounts", 0, Some(30), 1, 8),
            FieldSpec::integer("pub_rec", "Public Records", 0, Some(5), 1, 0),
        ];
        Self { fields }
    }
}

impl Default for DefaultRiskApp {
    fn default() -> Self {
        Self::new()
    }
}

impl FrontEnd for DefaultRiskApp {
    fn title(&self) -> &str {
        "Loan Default Risk Predictor"
    }

    fn task(&self) -> LoanTask {
        LoanTask::DefaultRisk
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn banner(&self) -> Vec<String> {
        vec!["Enter loan applicant details to predict the probability of default.".to_string()]
    }
}
