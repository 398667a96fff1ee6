use crate::error::MetricError;

fn check_inputs(labels: &[i32], scores: &[f64]) -> Result<(), MetricError> {
    if labels.len() != scores.len() {
        return Err(MetricError::LengthMismatch {
            labels: labels.len(),
            scores: scores.len(),
        });
    }
    if labels.is_empty() {
        return Err(MetricError::Empty);
    }
    Ok(())
}

/// Area under the ROC curve.
///
/// Computed from the Mann-Whitney statistic with tied scores sharing their
/// average rank, which equals the trapezoidal area under the ROC curve.
///
/// # Arguments
///
/// * `labels` - Binary labels, 1 for the positive class.
/// * `scores` - Scores where higher means more likely positive.
///
/// # Returns
///
/// The AUC, or [`MetricError::SingleClass`] when only one class is present.
pub fn roc_auc(labels: &[i32], scores: &[f64]) -> Result<f64, MetricError> {
    check_inputs(labels, scores)?;
    let n = labels.len();
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(MetricError::SingleClass);
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && scores[order[j]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; ties share the mean of i+1..=j
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        let positives = order[i..j].iter().filter(|&&k| labels[k] == 1).count();
        rank_sum_pos += avg_rank * positives as f64;
        i = j;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Cumulative true and false positives at each distinct threshold,
/// thresholds in decreasing order.
fn binary_clf_curve(labels: &[i32], scores: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let mut tp = 0.0;
    let mut fp = 0.0;
    for (pos, &k) in order.iter().enumerate() {
        if labels[k] == 1 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_group = pos + 1 == order.len() || scores[order[pos + 1]] != scores[k];
        if last_of_group {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(scores[k]);
        }
    }
    (tps, fps, thresholds)
}

/// Points of a ROC curve, starting at (0, 0).
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

pub fn roc_curve(labels: &[i32], scores: &[f64]) -> Result<RocCurve, MetricError> {
    check_inputs(labels, scores)?;
    let (tps, fps, thresholds) = binary_clf_curve(labels, scores);
    let total_pos = *tps.last().unwrap_or(&0.0);
    let total_neg = *fps.last().unwrap_or(&0.0);
    if total_pos == 0.0 || total_neg == 0.0 {
        return Err(MetricError::SingleClass);
    }
    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    curve.fpr.extend(fps.iter().map(|f| f / total_neg));
    curve.tpr.extend(tps.iter().map(|t| t / total_pos));
    curve.thresholds.extend(thresholds);
    Ok(curve)
}

/// Precision-recall pairs ordered by increasing threshold, closed with the
/// (recall 0, precision 1) point.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionRecallCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub thresholds: Vec<f64>,
}

pub fn precision_recall_curve(labels: &[i32], scores: &[f64]) -> Result<PrecisionRecallCurve, MetricError> {
    check_inputs(labels, scores)?;
    let (tps, fps, thresholds) = binary_clf_curve(labels, scores);
    let total_pos = *tps.last().unwrap_or(&0.0);
    if total_pos == 0.0 {
        return Err(MetricError::SingleClass);
    }
    let mut precision: Vec<f64> = tps.iter().zip(&fps).map(|(tp, fp)| tp / (tp + fp)).collect();
    let mut recall: Vec<f64> = tps.iter().map(|tp| tp / total_pos).collect();
    let mut thresholds = thresholds;
    precision.reverse();
    recall.reverse();
    thresholds.reverse();
    precision.push(1.0);
    recall.push(0.0);
    Ok(PrecisionRecallCurve {
        precision,
        recall,
        thresholds,
    })
}

/// Trapezoidal area under `y(x)` for monotonic `x` (either direction).
pub fn trapezoid_auc(x: &[f64], y: &[f64]) -> f64 {
    let area: f64 = x
        .windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum();
    area.abs()
}

/// Area under the precision-recall curve by the trapezoidal rule.
pub fn pr_auc(labels: &[i32], scores: &[f64]) -> Result<f64, MetricError> {
    let curve = precision_recall_curve(labels, scores)?;
    Ok(trapezoid_auc(&curve.recall, &curve.precision))
}

/// F1 score of hard predictions; 0 when there are no true positives.
pub fn f1_score(labels: &[i32], predictions: &[i32]) -> Result<f64, MetricError> {
    if labels.len() != predictions.len() {
        return Err(MetricError::LengthMismatch {
            labels: labels.len(),
            scores: predictions.len(),
        });
    }
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&l, &p) in labels.iter().zip(predictions) {
        match (l == 1, p == 1) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    if tp == 0 {
        return Ok(0.0);
    }
    Ok(2.0 * tp as f64 / (2 * tp + fp + fn_) as f64)
}

/// Percentile with linear interpolation between closest ranks (numpy's default).
///
/// # Arguments
///
/// * `values` - Sample, in any order. NaNs are not expected.
/// * `q` - Percentile in `[0, 100]`.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let position = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}
