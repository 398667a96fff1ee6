use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use plotly::common::{DashType, Line, Marker, Mode, Orientation};
use plotly::layout::{Axis, Layout};
use plotly::{Bar, Histogram, Plot, Scatter};

use crate::explain::Attribution;
use crate::stats::{PrecisionRecallCurve, RocCurve};

/// ROC curve with the chance diagonal.
pub fn plot_roc_curve(curve: &RocCurve, auc: f64) -> Plot {
    let roc = Scatter::new(curve.fpr.clone(), curve.tpr.clone())
        .mode(Mode::Lines)
        .name(&format!("ROC (AUC = {:.4})", auc));
    let chance = Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .name("Chance")
        .line(Line::new().color("grey").dash(DashType::Dash));

    let mut plot = Plot::new();
    plot.add_trace(roc);
    plot.add_trace(chance);
    plot.set_layout(
        Layout::new()
            .title("ROC Curve (Test Set)")
            .x_axis(Axis::new().title("False Positive Rate"))
            .y_axis(Axis::new().title("True Positive Rate")),
    );
    plot
}

pub fn plot_pr_curve(curve: &PrecisionRecallCurve, auc: f64) -> Plot {
    let pr = Scatter::new(curve.recall.clone(), curve.precision.clone())
        .mode(Mode::Lines)
        .name(&format!("PR (AUC = {:.4})", auc));
    let mut plot = Plot::new();
    plot.add_trace(pr);
    plot.set_layout(
        Layout::new()
            .title("Precision-Recall Curve (Test Set)")
            .x_axis(Axis::new().title("Recall"))
            .y_axis(Axis::new().title("Precision")),
    );
    plot
}

/// Histogram of bootstrap AUCs with the interval bounds marked.
pub fn plot_bootstrap_histogram(aucs: &[f64], ci_lower: f64, ci_upper: f64) -> Plot {
    let histogram = Histogram::new(aucs.to_vec()).name("Bootstrap ROC-AUC");
    let mut plot = Plot::new();
    plot.add_trace(histogram);
    for (bound, name) in [(ci_lower, "2.5th percentile"), (ci_upper, "97.5th percentile")] {
        let marker = Scatter::new(vec![bound, bound], vec![0.0, aucs.len() as f64 / 10.0])
            .mode(Mode::Lines)
            .name(name)
            .line(Line::new().color("red").dash(DashType::Dash));
        plot.add_trace(marker);
    }
    plot.set_layout(
        Layout::new()
            .title("Bootstrapped ROC-AUC")
            .x_axis(Axis::new().title("ROC-AUC"))
            .y_axis(Axis::new().title("Count")),
    );
    plot
}

/// Horizontal bars of mean |attribution| per feature, largest on top.
pub fn plot_global_importance(summary: &[(String, f64)]) -> Plot {
    let names: Vec<String> = summary.iter().rev().map(|(n, _)| n.clone()).collect();
    let values: Vec<f64> = summary.iter().rev().map(|(_, v)| *v).collect();
    let bars = Bar::new(values, names)
        .orientation(Orientation::Horizontal)
        .name("mean |SHAP|")
        .marker(Marker::new().color("#1e88e5"));
    let mut plot = Plot::new();
    plot.add_trace(bars);
    plot.set_layout(
        Layout::new()
            .title("Global feature importance")
            .x_axis(Axis::new().title("mean(|SHAP value|)"))
            .y_axis(Axis::new().auto_margin(true)),
    );
    plot
}

/// Additive force-style plot of one prediction.
///
/// Positive contributions push the margin up (towards the positive class),
/// negative ones push it down; the title states the baseline and output.
pub fn plot_force(attribution: &Attribution, top_k: usize) -> Plot {
    let ranked = attribution.ranked();
    let (shown, rest) = ranked.split_at(top_k.min(ranked.len()));

    let mut names: Vec<String> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    if !rest.is_empty() {
        names.push(format!("{} other features", rest.len()));
        values.push(rest.iter().map(|(_, v)| v).sum());
    }
    for (name, value) in shown.iter().rev() {
        names.push(name.clone());
        values.push(*value);
    }

    let (pos_names, pos_values): (Vec<String>, Vec<f64>) = names
        .iter()
        .zip(&values)
        .filter(|(_, v)| **v >= 0.0)
        .map(|(n, v)| (n.clone(), *v))
        .unzip();
    let (neg_names, neg_values): (Vec<String>, Vec<f64>) = names
        .iter()
        .zip(&values)
        .filter(|(_, v)| **v < 0.0)
        .map(|(n, v)| (n.clone(), *v))
        .unzip();

    let mut plot = Plot::new();
    plot.add_trace(
        Bar::new(pos_values, pos_names)
            .orientation(Orientation::Horizontal)
            .name("raises output")
            .marker(Marker::new().color("#ff0051")),
    );
    plot.add_trace(
        Bar::new(neg_values, neg_names)
            .orientation(Orientation::Horizontal)
            .name("lowers output")
            .marker(Marker::new().color("#008bfb")),
    );
    let title = format!(
        "base value {:.3} -> f(x) {:.3} (p = {:.3})",
        attribution.base_value,
        attribution.output,
        attribution.probability()
    );
    plot.set_layout(
        Layout::new()
            .title(title.as_str())
            .x_axis(Axis::new().title("contribution to log-odds"))
            .y_axis(Axis::new().auto_margin(true)),
    );
    plot
}

/// Render a plot into a temporary HTML file, hand its markup to `consume`
/// and delete the file afterwards, whether `consume` succeeds or not.
pub fn with_transient_html<T, F>(plot: &Plot, consume: F) -> Result<T>
where
    F: FnOnce(&str) -> Result<T>,
{
    with_transient_html_in(std::env::temp_dir(), plot, consume)
}

/// [`with_transient_html`] with the temporary file created under `dir`.
pub fn with_transient_html_in<T, F, P>(dir: P, plot: &Plot, consume: F) -> Result<T>
where
    F: FnOnce(&str) -> Result<T>,
    P: AsRef<Path>,
{
    let file = tempfile::Builder::new()
        .prefix("force_plot_")
        .suffix(".html")
        .tempfile_in(dir)
        .context("Failed to create a temporary explanation file")?;
    plot.write_html(file.path());
    let markup = fs::read_to_string(file.path())
        .with_context(|| format!("Failed to read explanation file {}", file.path().display()))?;
    log::trace!("rendered {} bytes of explanation markup to {}", markup.len(), file.path().display());
    let result = consume(&markup);
    // closing the handle removes the file; unwinding drops it the same way
    file.close().context("Failed to remove the temporary explanation file")?;
    result
}
