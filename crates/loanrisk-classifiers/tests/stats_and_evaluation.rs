//! Integration tests for metrics, the bootstrap interval and config types.

use loanrisk_classifiers::config::{BootstrapConfig, DegeneratePolicy, ModelConfig};
use loanrisk_classifiers::error::MetricError;
use loanrisk_classifiers::evaluation::bootstrap_auc_from_scores;
use loanrisk_classifiers::stats::{f1_score, pr_auc, precision_recall_curve, roc_auc};

// ---------------------------------------------------------------------------
// Point metrics
// ---------------------------------------------------------------------------

#[test]
fn perfect_ranking_scores_one() {
    let labels = [0, 0, 1, 1];
    let scores = [0.1, 0.2, 0.8, 0.9];
    assert_eq!(roc_auc(&labels, &scores).unwrap(), 1.0);
    assert!((pr_auc(&labels, &scores).unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn single_class_auc_is_an_error() {
    assert_eq!(roc_auc(&[1, 1, 1], &[0.2, 0.3, 0.4]), Err(MetricError::SingleClass));
}

#[test]
fn precision_recall_curve_ends_at_full_precision() {
    let labels = [1, 0, 1, 0];
    let scores = [0.9, 0.8, 0.4, 0.1];
    let curve = precision_recall_curve(&labels, &scores).unwrap();
    assert_eq!(curve.precision.last(), Some(&1.0));
    assert_eq!(curve.recall.last(), Some(&0.0));
    assert_eq!(curve.precision.len(), curve.thresholds.len() + 1);
    // recall is non-increasing along the curve
    assert!(curve.recall.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn f1_from_counts() {
    // tp = 2, fp = 1, fn = 1
    let f1 = f1_score(&[1, 1, 1, 0, 0], &[1, 1, 0, 1, 0]).unwrap();
    assert!((f1 - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(f1_score(&[1, 0], &[0, 0]).unwrap(), 0.0);
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

fn noisy_scores(n: usize) -> (Vec<i32>, Vec<f64>) {
    let labels: Vec<i32> = (0..n).map(|i| i32::from(i % 3 == 0)).collect();
    let scores = (0..n)
        .map(|i| ((i * 7919) % 101) as f64 / 100.0 + if i % 3 == 0 { 0.3 } else { 0.0 })
        .collect();
    (labels, scores)
}

#[test]
fn bootstrap_is_deterministic_for_a_seed() {
    let (labels, scores) = noisy_scores(300);
    let config = BootstrapConfig {
        n_iterations: 200,
        ..BootstrapConfig::default()
    };
    let a = bootstrap_auc_from_scores(&labels, &scores, &config).unwrap();
    let b = bootstrap_auc_from_scores(&labels, &scores, &config).unwrap();
    assert_eq!(a, b);
    assert!(a.ci_lower <= a.mean && a.mean <= a.ci_upper);
    assert_eq!(a.n_degenerate, 0);
    assert_eq!(a.aucs.len(), 200);

    let other = bootstrap_auc_from_scores(&labels, &scores, &BootstrapConfig { seed: 7, ..config }).unwrap();
    assert_ne!(a.aucs, other.aucs);
}

#[test]
fn degenerate_resamples_are_counted_or_fatal() {
    // one positive in three rows: many resamples miss it
    let labels = [1, 0, 0];
    let scores = [0.9, 0.2, 0.1];
    let skip = BootstrapConfig {
        n_iterations: 100,
        seed: 42,
        on_degenerate: DegeneratePolicy::Skip,
    };
    let report = bootstrap_auc_from_scores(&labels, &scores, &skip).unwrap();
    assert!(report.n_degenerate > 0);
    assert_eq!(report.aucs.len() + report.n_degenerate, 100);

    let fail = BootstrapConfig {
        on_degenerate: DegeneratePolicy::Fail,
        ..skip
    };
    assert!(matches!(
        bootstrap_auc_from_scores(&labels, &scores, &fail),
        Err(MetricError::DegenerateResample { .. })
    ));
}

#[test]
fn all_degenerate_resamples_is_an_error() {
    let err = bootstrap_auc_from_scores(&[1, 1], &[0.3, 0.4], &BootstrapConfig::default()).unwrap_err();
    assert_eq!(err, MetricError::AllResamplesDegenerate { iterations: 1000 });
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[test]
fn model_config_defaults() {
    let config = ModelConfig::default();
    assert_eq!(config.num_boost_round, 500);
    assert_eq!(config.learning_rate, 0.1);
    assert_eq!(config.max_depth, 6);
    assert_eq!(config.class_weights, [1.0, 2.0]);
    assert!(config.validate().is_ok());
}

#[test]
fn model_config_partial_json_uses_defaults() {
    let config: ModelConfig = serde_json::from_str(r#"{"max_depth": 3}"#).unwrap();
    assert_eq!(config.max_depth, 3);
    assert_eq!(config.num_boost_round, 500);
}

#[test]
fn invalid_model_config_is_rejected() {
    let config = ModelConfig {
        class_weights: [1.0, 0.0],
        ..ModelConfig::default()
    };
    assert!(config.validate().is_err());
}
