use std::fmt;
use std::time::Instant;

use anyhow::{Context, Result};
use log::debug;
use ndarray::Array2;
use serde_json::Value as Json;
use xgb::{
    parameters::{
        learning::{LearningTaskParametersBuilder, Objective},
        tree::{TreeBoosterParametersBuilder, TreeMethod},
        BoosterParametersBuilder, BoosterType,
    },
    Booster, DMatrix,
};

use crate::config::ModelConfig;
use crate::models::classifier_trait::ClassifierModel;

/// `type` field of the XGBoost prediction config.
#[derive(Debug, Clone, Copy)]
enum PredictionType {
    Margin = 1,
    Contribution = 2,
}

/// Binary log-loss gradient-boosted trees trained by XGBoost's `hist` method.
///
/// Categorical columns arrive ordinal-encoded by the feature schema and
/// missing cells as NaN, which XGBoost routes along each split's learned
/// default direction. Per-row weights come from the class weights in
/// [`ModelConfig`].
pub struct XGBoostClassifier {
    config: ModelConfig,
    booster: Option<Booster>,
    n_features: usize,
    n_trees: usize,
    /// Summed loss reduction of the splits on each feature.
    gain: Vec<f64>,
}

impl fmt::Debug for XGBoostClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XGBoostClassifier")
            .field("config", &self.config)
            .field("fitted", &self.booster.is_some())
            .field("n_features", &self.n_features)
            .field("n_trees", &self.n_trees)
            .finish()
    }
}

/// Shape and split gains read back from a JSON model dump.
struct ModelSummary {
    n_features: usize,
    n_trees: usize,
    gain: Vec<f64>,
}

fn json_count(model: &Json, pointer: &str) -> Result<usize> {
    let value = model
        .pointer(pointer)
        .with_context(|| format!("Model JSON lacks {}", pointer))?;
    value
        .as_str()
        .and_then(|s| s.parse::<usize>().ok())
        .or_else(|| value.as_u64().map(|n| n as usize))
        .with_context(|| format!("Model JSON field {} is not a count: {}", pointer, value))
}

fn summarize_model(buffer: &[u8]) -> Result<ModelSummary> {
    let model: Json = serde_json::from_slice(buffer).context("Model buffer is not valid JSON")?;
    let n_features = json_count(&model, "/learner/learner_model_param/num_feature")?;
    let n_trees = json_count(&model, "/learner/gradient_booster/model/gbtree_model_param/num_trees")?;

    let mut gain = vec![0.0; n_features];
    let trees = model
        .pointer("/learner/gradient_booster/model/trees")
        .and_then(Json::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for tree in trees {
        let column = |key: &str| tree.get(key).and_then(Json::as_array).cloned().unwrap_or_default();
        let left = column("left_children");
        let features = column("split_indices");
        let losses = column("loss_changes");
        for ((child, feature), loss) in left.iter().zip(&features).zip(&losses) {
            // leaves have no left child
            if child.as_i64().unwrap_or(-1) < 0 {
                continue;
            }
            if let (Some(j), Some(loss)) = (feature.as_u64(), loss.as_f64()) {
                if let Some(slot) = gain.get_mut(j as usize) {
                    *slot += loss;
                }
            }
        }
    }
    Ok(ModelSummary {
        n_features,
        n_trees,
        gain,
    })
}

fn dense_matrix(x: &Array2<f32>) -> Result<DMatrix> {
    let data = x.as_standard_layout();
    let slice = data.as_slice().context("Feature matrix is not contiguous")?;
    debug!(
        "Creating DMatrix from dense data: rows={}, cols={}, len={}",
        x.nrows(),
        x.ncols(),
        slice.len()
    );
    DMatrix::from_dense(slice, x.nrows()).context("Failed to build an XGBoost DMatrix")
}

impl XGBoostClassifier {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            booster: None,
            n_features: 0,
            n_trees: 0,
            gain: Vec::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    pub fn is_fitted(&self) -> bool {
        self.booster.is_some()
    }

    pub fn check_features(&self, n_columns: usize) -> Result<()> {
        if n_columns != self.n_features {
            anyhow::bail!(
                "Model expects {} features but input has {}",
                self.n_features,
                n_columns
            );
        }
        Ok(())
    }

    /// Split gain per feature, normalised to sum to one.
    pub fn feature_importance(&self) -> Vec<f64> {
        let total: f64 = self.gain.iter().sum();
        if total > 0.0 {
            self.gain.iter().map(|g| g / total).collect()
        } else {
            vec![0.0; self.n_features]
        }
    }

    /// Serialise the trained booster as XGBoost JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let booster = self.booster.as_ref().context("Model has not been fitted")?;
        booster.save_buffer(false).context("Failed to serialise the booster")
    }

    /// Restore a booster written by [`XGBoostClassifier::to_json`].
    pub fn from_json(buffer: &[u8]) -> Result<Self> {
        let summary = summarize_model(buffer)?;
        let booster = Booster::load_buffer(buffer).context("Failed to load the booster")?;
        Ok(Self {
            config: ModelConfig::default(),
            booster: Some(booster),
            n_features: summary.n_features,
            n_trees: summary.n_trees,
            gain: summary.gain,
        })
    }

    fn predict_as(&self, x: &Array2<f32>, kind: PredictionType) -> Result<Vec<f32>> {
        let booster = self.booster.as_ref().context("Model has not been fitted")?;
        self.check_features(x.ncols())?;
        if x.nrows() == 0 {
            return Ok(Vec::new());
        }
        let dmat = dense_matrix(x)?;
        // iteration_end pins prediction to the full ensemble
        let config = format!(
            "{{\"type\":{},\"training\":false,\"iteration_begin\":0,\"iteration_end\":{},\"strict_shape\":false}}\0",
            kind as i32, self.n_trees
        );
        let (values, _shape) = booster
            .predict_matrix(&dmat, &config)
            .with_context(|| format!("XGBoost {:?} prediction failed", kind))?;
        Ok(values)
    }

    /// Per-row feature contributions in margin space.
    ///
    /// Returns a `rows x (features + 1)` matrix; the last column is the bias
    /// (expected margin), so each row sums to the row's raw margin.
    pub fn contributions(&self, x: &Array2<f32>) -> Result<Array2<f64>> {
        let values = self.predict_as(x, PredictionType::Contribution)?;
        let width = self.n_features + 1;
        if values.len() != x.nrows() * width {
            anyhow::bail!(
                "Expected {} contribution values for {} rows, got {}",
                x.nrows() * width,
                x.nrows(),
                values.len()
            );
        }
        let values: Vec<f64> = values.into_iter().map(f64::from).collect();
        Ok(Array2::from_shape_vec((x.nrows(), width), values)?)
    }
}

impl ClassifierModel for XGBoostClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<()> {
        self.config.validate()?;
        let n_rows = x.nrows();
        if n_rows == 0 {
            anyhow::bail!("Cannot fit on an empty feature matrix");
        }
        if y.len() != n_rows {
            anyhow::bail!("Feature matrix has {} rows but {} labels were given", n_rows, y.len());
        }
        if let Some(bad) = y.iter().find(|l| **l != 0 && **l != 1) {
            anyhow::bail!("Labels must be 0 or 1, found {}", bad);
        }

        let mut dtrain = dense_matrix(x)?;
        dtrain
            .set_labels(&y.iter().map(|&l| l as f32).collect::<Vec<f32>>())
            .context("Failed to set training labels")?;
        let weights: Vec<f32> = y
            .iter()
            .map(|&l| self.config.class_weights[l as usize] as f32)
            .collect();
        dtrain.set_weights(&weights).context("Failed to set class weights")?;

        let learning_params = LearningTaskParametersBuilder::default()
            .objective(Objective::BinaryLogistic)
            .build()
            .map_err(anyhow::Error::msg)?;
        let tree_params = TreeBoosterParametersBuilder::default()
            .tree_method(TreeMethod::Hist)
            .max_depth(self.config.max_depth as u32)
            .eta(self.config.learning_rate as f32)
            .lambda(self.config.l2_regularization as f32)
            .gamma(self.config.min_split_gain as f32)
            .min_child_weight(self.config.min_child_weight as f32)
            .max_bin(self.config.max_bins as u32)
            .build()
            .map_err(anyhow::Error::msg)?;
        let booster_params = BoosterParametersBuilder::default()
            .booster_type(BoosterType::Tree(tree_params))
            .learning_params(learning_params)
            .verbose(false)
            .build()
            .map_err(anyhow::Error::msg)?;

        let start = Instant::now();
        let mut booster =
            Booster::new_with_cached_dmats(&booster_params, &[&dtrain]).context("Failed to create the booster")?;
        // explicit update loop; the convenience train API may skip rounds
        for round in 0..self.config.num_boost_round {
            booster
                .update(&dtrain, round as i32)
                .with_context(|| format!("Boosting round {} failed", round))?;
            if (round + 1) % 50 == 0 {
                debug!("[round {}] elapsed {:?}", round + 1, start.elapsed());
            }
        }

        let buffer = booster.save_buffer(false).context("Failed to serialise the booster")?;
        let summary = summarize_model(&buffer)?;
        debug!(
            "model dump: {} bytes, {} trees over {} features",
            buffer.len(),
            summary.n_trees,
            summary.n_features
        );
        if summary.n_trees == 0 && self.config.num_boost_round > 0 {
            anyhow::bail!("Training produced no trees");
        }
        self.n_features = summary.n_features;
        self.n_trees = summary.n_trees;
        self.gain = summary.gain;
        self.booster = Some(booster);
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f32>) -> Result<Vec<f64>> {
        let margins = self.predict_as(x, PredictionType::Margin)?;
        Ok(margins.into_iter().map(f64::from).collect())
    }

    fn name(&self) -> &str {
        "xgboost"
    }
}
