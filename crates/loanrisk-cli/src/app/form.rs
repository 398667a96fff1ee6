//! Line-oriented form engine for the terminal front-ends.
//!
//! Each field is prompted in turn. An empty line accepts the default, an
//! invalid or out-of-range answer re-prompts, numbers snap to the field's
//! step grid and `q` or end of input abandons the form.
use std::io::{BufRead, Write};

use anyhow::Result;

use loanrisk_classifiers::data_handling::{Record, Value};

pub const QUIT: &str = "q";

/// Accepted answers for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Integer {
        min: i64,
        max: Option<i64>,
        step: i64,
        default: i64,
    },
    Float {
        min: f64,
        max: Option<f64>,
        step: f64,
        default: f64,
    },
    /// Labelled options; the answer is the option's value.
    Choice {
        options: Vec<(String, Value)>,
        default: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Record key the answer is stored under.
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn integer(name: &str, label: &str, min: i64, max: Option<i64>, step: i64, default: i64) -> Self {
        Self::new(name, label, FieldKind::Integer { min, max, step, default })
    }

    pub fn float(name: &str, label: &str, min: f64, max: Option<f64>, step: f64, default: f64) -> Self {
        Self::new(name, label, FieldKind::Float { min, max, step, default })
    }

    /// Choice whose values are the labels themselves.
    pub fn text_choice(name: &str, label: &str, options: &[&str]) -> Self {
        let options = options.iter().map(|o| (o.to_string(), Value::from(*o))).collect();
        Self::new(name, label, FieldKind::Choice { options, default: 0 })
    }

    pub fn choice(name: &str, label: &str, options: Vec<(String, Value)>) -> Self {
        Self::new(name, label, FieldKind::Choice { options, default: 0 })
    }

    fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
        }
    }

    pub fn default_value(&self) -> Value {
        match &self.kind {
            FieldKind::Integer { default, .. } => Value::Number(*default as f64),
            FieldKind::Float { default, .. } => Value::Number(*default),
            FieldKind::Choice { options, default } => options
                .get(*default)
                .map(|(_, value)| value.clone())
                .unwrap_or(Value::Missing),
        }
    }

    /// Prompt line, e.g. `Interest Rate (%) [5-30, step 0.1] (13):`.
    pub fn prompt(&self) -> String {
        let hint = match &self.kind {
            FieldKind::Integer { min, max, step, default } => {
                format!("[{}] ({})", range_hint(*min as f64, max.map(|m| m as f64), *step as f64), default)
            }
            FieldKind::Float { min, max, step, default } => {
                format!("[{}] ({})", range_hint(*min, *max, *step), default)
            }
            FieldKind::Choice { options, default } => {
                let labels: Vec<String> = options
                    .iter()
                    .enumerate()
                    .map(|(i, (label, _))| format!("{}) {}", i + 1, label))
                    .collect();
                let default_label = options.get(*default).map(|(l, _)| l.as_str()).unwrap_or("");
                format!("[{}] ({})", labels.join(", "), default_label)
            }
        };
        format!("{} {}: ", self.label, hint)
    }

    /// Parse one answer. `Err` carries the message shown before re-prompting.
    pub fn parse(&self, input: &str) -> Result<Value, String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(self.default_value());
        }
        match &self.kind {
            FieldKind::Integer { min, max, step, .. } => {
                let value: f64 = input
                    .parse()
                    .map_err(|_| format!("'{}' is not a number", input))?;
                let value = check_range(value, *min as f64, max.map(|m| m as f64))?;
                Ok(Value::Number(snap(value, *min as f64, max.map(|m| m as f64), *step as f64).round()))
            }
            FieldKind::Float { min, max, step, .. } => {
                let value: f64 = input
                    .parse()
                    .map_err(|_| format!("'{}' is not a number", input))?;
                let value = check_range(value, *min, *max)?;
                Ok(Value::Number(snap(value, *min, *max, *step)))
            }
            FieldKind::Choice { options, .. } => {
                if let Ok(index) = input.parse::<usize>() {
                    if (1..=options.len()).contains(&index) {
                        return Ok(options[index - 1].1.clone());
                    }
                }
                options
                    .iter()
                    .find(|(label, _)| label.eq_ignore_ascii_case(input))
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| format!("'{}' is not one of the listed options", input))
            }
        }
    }
}

fn range_hint(min: f64, max: Option<f64>, step: f64) -> String {
    match max {
        Some(max) => format!("{}-{}, step {}", min, max, step),
        None => format!(">= {}, step {}", min, step),
    }
}

fn check_range(value: f64, min: f64, max: Option<f64>) -> Result<f64, String> {
    if !value.is_finite() {
        return Err("value must be finite".to_string());
    }
    if value < min || max.map_or(false, |max| value > max) {
        return Err(match max {
            Some(max) => format!("value must be between {} and {}", min, max),
            None => format!("value must be at least {}", min),
        });
    }
    Ok(value)
}

/// Snap `value` to the grid `min + k * step`, staying within `max`.
pub fn snap(value: f64, min: f64, max: Option<f64>, step: f64) -> f64 {
    if !(step > 0.0) {
        return value;
    }
    let k = ((value - min) / step).round();
    let mut snapped = min + k * step;
    if let Some(max) = max {
        if snapped > max {
            snapped -= step;
        }
    }
    round_to_step_precision(snapped, step)
}

/// Drop the representation noise left by `min + k * step` (13.000000000000002).
fn round_to_step_precision(value: f64, step: f64) -> f64 {
    let decimals = (0..=6)
        .find(|d| {
            let scaled = step * 10f64.powi(*d);
            (scaled - scaled.round()).abs() < 1e-9
        })
        .unwrap_or(6);
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Read one line; `None` at end of input.
pub fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Prompt for every field in order.
///
/// Returns `None` when the user quits or the input ends.
pub fn collect<R: BufRead, W: Write>(fields: &[FieldSpec], input: &mut R, output: &mut W) -> Result<Option<Record>> {
    let mut record = Record::new();
    for field in fields {
        loop {
            write!(output, "{}", field.prompt())?;
            output.flush()?;
            let Some(line) = read_line(input)? else {
                return Ok(None);
            };
            if line.trim().eq_ignore_ascii_case(QUIT) {
                return Ok(None);
            }
            match field.parse(&line) {
                Ok(value) => {
                    record.insert(&field.name, value);
                    break;
                }
                Err(message) => writeln!(output, "  {}; try again", message)?,
            }
        }
    }
    Ok(Some(record))
}
