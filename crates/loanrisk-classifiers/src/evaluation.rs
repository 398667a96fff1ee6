//! Hold-out metrics and the bootstrap ROC-AUC interval.
use std::fmt;

use anyhow::Result;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::config::{BootstrapConfig, DegeneratePolicy};
use crate::error::MetricError;
use crate::models::ClassifierModel;
use crate::stats::{f1_score, percentile, pr_auc, roc_auc};

/// Point metrics on the test partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub roc_auc: f64,
    pub pr_auc: f64,
    /// F1 at the default 0.5 probability threshold.
    pub f1: f64,
    pub n_samples: usize,
    pub n_positive: usize,
}

/// Bootstrap distribution summary of the ROC-AUC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootstrapReport {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub n_iterations: usize,
    /// Resamples left out because they contained a single class.
    pub n_degenerate: usize,
    /// AUC of every usable resample, in iteration order.
    #[serde(skip)]
    pub aucs: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub metrics: Metrics,
    pub bootstrap: BootstrapReport,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "ROC-AUC: {:.4}", self.metrics.roc_auc)?;
        writeln!(f, "PR-AUC: {:.4}", self.metrics.pr_auc)?;
        writeln!(f, "F1 Score: {:.4}", self.metrics.f1)?;
        write!(
            f,
            "Bootstrapped ROC-AUC: {:.4} (95% CI: {:.4}-{:.4})",
            self.bootstrap.mean, self.bootstrap.ci_lower, self.bootstrap.ci_upper
        )?;
        if self.bootstrap.n_degenerate > 0 {
            write!(
                f,
                " [{} of {} resamples skipped: single class]",
                self.bootstrap.n_degenerate, self.bootstrap.n_iterations
            )?;
        }
        Ok(())
    }
}

/// Score the test partition with ROC-AUC, PR-AUC and F1.
pub fn evaluate<M: ClassifierModel + ?Sized>(model: &M, x: &Array2<f32>, y: &[i32]) -> Result<Metrics> {
    let probabilities = model.predict_proba(x)?;
    let predictions = model.predict(x)?;
    Ok(Metrics {
        roc_auc: roc_auc(y, &probabilities)?,
        pr_auc: pr_auc(y, &probabilities)?,
        f1: f1_score(y, &predictions)?,
        n_samples: y.len(),
        n_positive: y.iter().filter(|&&l| l == 1).count(),
    })
}

/// Bootstrap the ROC-AUC of a model on the test partition.
///
/// Predictions are computed once; each iteration resamples row indices
/// with replacement.
pub fn bootstrap_auc<M: ClassifierModel + ?Sized>(
    model: &M,
    x: &Array2<f32>,
    y: &[i32],
    config: &BootstrapConfig,
) -> Result<BootstrapReport> {
    let probabilities = model.predict_proba(x)?;
    Ok(bootstrap_auc_from_scores(y, &probabilities, config)?)
}

/// Bootstrap the ROC-AUC from precomputed scores.
///
/// Every iteration gets its own RNG seeded from the master seed, so the
/// result is identical for identical inputs whatever the thread count.
pub fn bootstrap_auc_from_scores(
    labels: &[i32],
    scores: &[f64],
    config: &BootstrapConfig,
) -> Result<BootstrapReport, MetricError> {
    if labels.len() != scores.len() {
        return Err(MetricError::LengthMismatch {
            labels: labels.len(),
            scores: scores.len(),
        });
    }
    if labels.is_empty() || config.n_iterations == 0 {
        return Err(MetricError::Empty);
    }

    let mut master = StdRng::seed_from_u64(config.seed);
    let seeds: Vec<u64> = (0..config.n_iterations).map(|_| master.gen()).collect();
    let n = labels.len();

    let results: Vec<Result<f64, MetricError>> = seeds
        .par_iter()
        .map(|&seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut sample_labels = Vec::with_capacity(n);
            let mut sample_scores = Vec::with_capacity(n);
            for _ in 0..n {
                let k = rng.gen_range(0..n);
                sample_labels.push(labels[k]);
                sample_scores.push(scores[k]);
            }
            roc_auc(&sample_labels, &sample_scores)
        })
        .collect();

    let mut aucs = Vec::with_capacity(results.len());
    let mut n_degenerate = 0;
    for (iteration, result) in results.into_iter().enumerate() {
        match result {
            Ok(auc) => aucs.push(auc),
            Err(MetricError::SingleClass) => match config.on_degenerate {
                DegeneratePolicy::Skip => n_degenerate += 1,
                DegeneratePolicy::Fail => return Err(MetricError::DegenerateResample { iteration }),
            },
            Err(other) => return Err(other),
        }
    }
    if aucs.is_empty() {
        return Err(MetricError::AllResamplesDegenerate {
            iterations: config.n_iterations,
        });
    }
    if n_degenerate > 0 {
        log::warn!(
            "{} of {} bootstrap resamples contained a single class and were skipped",
            n_degenerate,
            config.n_iterations
        );
    }

    let std_dev = if aucs.len() > 1 { aucs.iter().std_dev() } else { 0.0 };
    Ok(BootstrapReport {
        mean: aucs.iter().mean(),
        std_dev,
        ci_lower: percentile(&aucs, 2.5).unwrap_or(f64::NAN),
        ci_upper: percentile(&aucs, 97.5).unwrap_or(f64::NAN),
        n_iterations: config.n_iterations,
        n_degenerate,
        aucs,
    })
}

/// Point metrics plus bootstrap interval.
pub fn evaluate_with_bootstrap<M: ClassifierModel + ?Sized>(
    model: &M,
    x: &Array2<f32>,
    y: &[i32],
    config: &BootstrapConfig,
) -> Result<EvaluationReport> {
    let metrics = evaluate(model, x, y)?;
    let bootstrap = bootstrap_auc(model, x, y, config)?;
    Ok(EvaluationReport { metrics, bootstrap })
}
