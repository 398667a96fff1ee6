use std::error::Error;
use std::fmt;

/// Failures raised while computing classification metrics.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Labels and scores differ in length.
    LengthMismatch { labels: usize, scores: usize },
    /// No samples were supplied.
    Empty,
    /// Only one class is present, so the ranking metric is undefined.
    SingleClass,
    /// A bootstrap resample contained a single class and the policy forbids skipping it.
    DegenerateResample { iteration: usize },
    /// Every bootstrap resample contained a single class.
    AllResamplesDegenerate { iterations: usize },
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetricError::LengthMismatch { labels, scores } => write!(
                f,
                "Labels and scores must have equal length (got {} labels, {} scores)",
                labels, scores
            ),
            MetricError::Empty => write!(f, "Cannot compute a metric over zero samples"),
            MetricError::SingleClass => {
                write!(f, "Only one class present in labels; metric is undefined")
            }
            MetricError::DegenerateResample { iteration } => write!(
                f,
                "Bootstrap resample {} contained a single class",
                iteration
            ),
            MetricError::AllResamplesDegenerate { iterations } => write!(
                f,
                "All {} bootstrap resamples contained a single class",
                iterations
            ),
        }
    }
}

impl Error for MetricError {}
