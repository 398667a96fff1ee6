use serde::{Deserialize, Serialize};

/// Hyper-parameters of the gradient-boosted tree classifier, passed through
/// to XGBoost (`eta`, `lambda`, `gamma`, `min_child_weight`, `max_bin`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub learning_rate: f64,
    pub num_boost_round: usize,
    pub max_depth: usize,
    /// L2 penalty on leaf weights.
    pub l2_regularization: f64,
    /// Minimum hessian mass a child must carry for a split to be accepted.
    pub min_child_weight: f64,
    /// Minimum loss reduction required to split a node.
    pub min_split_gain: f64,
    /// Maximum number of histogram bins for numeric features.
    pub max_bins: usize,
    /// Per-sample weight for label 0 and label 1.
    pub class_weights: [f64; 2],
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            num_boost_round: 500,
            max_depth: 6,
            l2_regularization: 3.0,
            min_child_weight: 1.0,
            min_split_gain: 0.0,
            max_bins: 255,
            class_weights: [1.0, 2.0],
        }
    }
}

impl ModelConfig {
    pub fn with_rounds(mut self, num_boost_round: usize) -> Self {
        self.num_boost_round = num_boost_round;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.learning_rate > 0.0) {
            anyhow::bail!("learning_rate must be positive, got {}", self.learning_rate);
        }
        if self.max_bins < 2 {
            anyhow::bail!("max_bins must be at least 2, got {}", self.max_bins);
        }
        if self.max_depth == 0 {
            anyhow::bail!("max_depth must be positive");
        }
        if self.class_weights.iter().any(|w| !(*w > 0.0)) {
            anyhow::bail!("class_weights must be positive, got {:?}", self.class_weights);
        }
        if self.l2_regularization < 0.0 {
            anyhow::bail!("l2_regularization must be non-negative");
        }
        Ok(())
    }
}

/// What to do with bootstrap resamples that contain a single class.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Leave the resample out of the interval and count it.
    #[default]
    Skip,
    /// Abort the bootstrap.
    Fail,
}

/// Bootstrap settings for the ROC-AUC confidence interval.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BootstrapConfig {
    pub n_iterations: usize,
    pub seed: u64,
    pub on_degenerate: DegeneratePolicy,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_iterations: 1000,
            seed: 42,
            on_degenerate: DegeneratePolicy::Skip,
        }
    }
}
