//! Interactive terminal front-ends.
//!
//! A session alternates between two states: collecting a form
//! (`AwaitingInput`) and showing the verdict for the last submission
//! (`Predicted`). It ends on `q` or end of input.
pub mod cache;
pub mod currency;
pub mod default_risk;
pub mod eligibility;
pub mod form;

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use loanrisk_classifiers::artifacts::Prediction;
use loanrisk_classifiers::data_handling::Record;
use loanrisk_classifiers::task::LoanTask;

use crate::predict::{score_record, verdict, write_explanation_page};
use cache::ModelCache;
use form::{collect, read_line, FieldSpec, QUIT};

/// Contributions printed under each verdict.
const TOP_CONTRIBUTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    AwaitingInput,
    Predicted(Prediction),
}

/// One interactive predictor: its form and how answers become a raw record.
pub trait FrontEnd {
    fn title(&self) -> &str;

    fn task(&self) -> LoanTask;

    fn fields(&self) -> &[FieldSpec];

    /// Lines shown once when the session starts.
    fn banner(&self) -> Vec<String> {
        Vec::new()
    }

    /// Raw applicant record from the collected answers, before derivation.
    fn build_record(&self, answers: Record) -> Result<Record> {
        Ok(answers)
    }

    fn verdict(&self, prediction: &Prediction) -> String {
        verdict(self.task(), prediction)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Print the largest attributions under each verdict.
    pub explain: bool,
    /// Write a force-plot page per prediction into this directory.
    pub explain_dir: Option<PathBuf>,
}

/// Run a session until the user quits. Returns the number of predictions made.
pub fn run_session<R: BufRead, W: Write>(
    front_end: &dyn FrontEnd,
    cache: &mut ModelCache,
    options: &SessionOptions,
    input: &mut R,
    output: &mut W,
) -> Result<usize> {
    writeln!(output, "{}", front_end.title())?;
    for line in front_end.banner() {
        writeln!(output, "{}", line)?;
    }

    let mut n_predictions = 0;
    let mut state = AppState::AwaitingInput;
    loop {
        state = match state {
            AppState::AwaitingInput => {
                let Some(answers) = collect(front_end.fields(), input, output)? else {
                    break;
                };
                let prediction = predict_once(front_end, cache, options, answers, n_predictions, output)?;
                n_predictions += 1;
                AppState::Predicted(prediction)
            }
            AppState::Predicted(_) => {
                write!(output, "Press Enter for another applicant or '{}' to quit: ", QUIT)?;
                output.flush()?;
                match read_line(input)? {
                    Some(line) if !line.trim().eq_ignore_ascii_case(QUIT) => AppState::AwaitingInput,
                    _ => break,
                }
            }
        };
    }
    writeln!(output, "Goodbye.")?;
    Ok(n_predictions)
}

fn predict_once<W: Write>(
    front_end: &dyn FrontEnd,
    cache: &mut ModelCache,
    options: &SessionOptions,
    answers: Record,
    index: usize,
    output: &mut W,
) -> Result<Prediction> {
    let record = front_end.build_record(answers)?;
    let bundle = cache.get().context("Failed to load the model")?;
    let (record, prediction) = score_record(front_end.task(), bundle, record)?;
    writeln!(output, "{}", front_end.verdict(&prediction))?;

    if options.explain || options.explain_dir.is_some() {
        let attribution = bundle.explain_record(&record)?;
        if options.explain {
            writeln!(
                output,
                "Explanation (log-odds): base {:.4} -> output {:.4}",
                attribution.base_value, attribution.output
            )?;
            for (name, value) in attribution.ranked().into_iter().take(TOP_CONTRIBUTIONS) {
                writeln!(output, "  {:<24} {:+.4}", name, value)?;
            }
        }
        if let Some(dir) = &options.explain_dir {
            let path = dir.join(format!("explanation_{}.html", index + 1));
            write_explanation_page(front_end.task(), &prediction, &attribution, &path)?;
            writeln!(output, "Force plot written to {}", path.display())?;
        }
    }
    Ok(prediction)
}
