use anyhow::Result;
use ndarray::Array2;

/// Contract between the pipeline and a binary classifier.
///
/// Labels use the crate convention (1 for the positive class, 0 otherwise).
pub trait ClassifierModel {
    /// Fit the model on an encoded feature matrix.
    fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<()>;

    /// Raw margins (log-odds of the positive class).
    fn decision_function(&self, x: &Array2<f32>) -> Result<Vec<f64>>;

    /// Positive-class probabilities.
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Vec<f64>> {
        Ok(self.decision_function(x)?.into_iter().map(sigmoid).collect())
    }

    /// Hard class predictions at the default threshold (p > 0.5).
    fn predict(&self, x: &Array2<f32>) -> Result<Vec<i32>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|m| i32::from(m > 0.0))
            .collect())
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

pub fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}
