//! Feature attributions for trained models.
//!
//! Attributions are XGBoost's exact tree contributions: one signed value per
//! feature plus a bias column holding the expected margin.
use anyhow::Result;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::models::classifier_trait::sigmoid;
use crate::models::{ClassifierModel, XGBoostClassifier};
use crate::schema::FeatureSchema;

/// Additive explanation of one prediction, in margin (log-odds) space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub base_value: f64,
    pub contributions: Vec<(String, f64)>,
    /// Model margin for the explained row.
    pub output: f64,
}

impl Attribution {
    /// `base_value + Σ contributions`; equals `output` up to rounding.
    pub fn reconstructed(&self) -> f64 {
        self.base_value + self.contributions.iter().map(|(_, v)| v).sum::<f64>()
    }

    pub fn probability(&self) -> f64 {
        sigmoid(self.output)
    }

    /// Contributions ordered by decreasing magnitude.
    pub fn ranked(&self) -> Vec<(String, f64)> {
        let mut ranked = self.contributions.clone();
        ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        ranked
    }
}

/// Explain a single encoded row.
pub fn explain_row(model: &XGBoostClassifier, schema: &FeatureSchema, row: &[f32]) -> Result<Attribution> {
    model.check_features(schema.len())?;
    let x = Array2::from_shape_vec((1, row.len()), row.to_vec())?;
    let phi = model.contributions(&x)?;
    let output = model
        .decision_function(&x)?
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Model returned no margin for the explained row"))?;
    let n = schema.len();
    Ok(Attribution {
        base_value: phi[[0, n]],
        contributions: schema
            .names()
            .into_iter()
            .map(str::to_string)
            .zip(phi.row(0).iter().take(n).copied())
            .collect(),
        output,
    })
}

/// Mean absolute attribution per feature, sorted descending.
pub fn global_importance(
    model: &XGBoostClassifier,
    schema: &FeatureSchema,
    x: &Array2<f32>,
) -> Result<Vec<(String, f64)>> {
    model.check_features(schema.len())?;
    if x.nrows() == 0 {
        anyhow::bail!("Cannot summarise attributions over zero rows");
    }
    let phi = model.contributions(x)?;
    let mut summary: Vec<(String, f64)> = schema
        .names()
        .into_iter()
        .enumerate()
        .map(|(j, name)| {
            let mean_abs = phi.column(j).iter().map(|v| v.abs()).sum::<f64>() / x.nrows() as f64;
            (name.to_string(), mean_abs)
        })
        .collect();
    summary.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(summary)
}

/// Rows drawn without replacement for the global summary (all rows when fewer).
pub fn sample_rows(n_rows: usize, sample_size: usize, seed: u64) -> Vec<usize> {
    if n_rows <= sample_size {
        return (0..n_rows).collect();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = rand::seq::index::sample(&mut rng, n_rows, sample_size).into_vec();
    rows.sort_unstable();
    rows
}
