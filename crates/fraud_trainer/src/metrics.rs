//! Binary classification metrics
//!
//! Curve-based scores (PR-AUC, ROC-AUC) work on predicted fraud probabilities;
//! per-class scores work on thresholded predictions. Undefined ratios (no
//! predicted or no actual rows of a class) score 0.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TrainerError};

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Score the predictions for `label` as the positive class
pub fn class_metrics(y_true: &[u8], y_pred: &[u8], label: u8) -> ClassMetrics {
    let mut tp = 0;
    let mut predicted = 0;
    let mut support = 0;
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if p == label {
            predicted += 1;
        }
        if t == label {
            support += 1;
            if p == label {
                tp += 1;
            }
        }
    }
    let precision = ratio(tp, predicted);
    let recall = ratio(tp, support);
    ClassMetrics {
        label,
        precision,
        recall,
        f1: harmonic_mean(precision, recall),
        support,
    }
}

/// F1 of the fraud class
pub fn f1_score(y_true: &[u8], y_pred: &[u8]) -> f64 {
    class_metrics(y_true, y_pred, 1).f1
}

pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    ratio(correct, y_true.len())
}

pub fn threshold_predictions(scores: &[f64], threshold: f64) -> Vec<u8> {
    scores.iter().map(|&s| u8::from(s >= threshold)).collect()
}

/// Cumulative (true positive, false positive) counts at each distinct score,
/// from the highest score down
fn cumulative_counts(y_true: &[u8], scores: &[f64]) -> Vec<(usize, usize)> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = Vec::new();
    let (mut tp, mut fp) = (0usize, 0usize);
    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_group = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_group {
            points.push((tp, fp));
        }
    }
    points
}

fn check_inputs(y_true: &[u8], scores: &[f64]) -> Result<(usize, usize)> {
    if y_true.len() != scores.len() {
        return Err(TrainerError::InvalidParameter(format!(
            "{} labels but {} scores",
            y_true.len(),
            scores.len()
        )));
    }
    let positives = y_true.iter().filter(|&&l| l == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(TrainerError::InsufficientData(
            "curve metrics need both classes in the evaluation labels".into(),
        ));
    }
    Ok((positives, negatives))
}

/// (recall, precision) points ordered by decreasing threshold, starting at
/// recall 0 with precision 1
pub fn precision_recall_curve(y_true: &[u8], scores: &[f64]) -> Result<Vec<(f64, f64)>> {
    let (positives, _) = check_inputs(y_true, scores)?;
    let mut curve = vec![(0.0, 1.0)];
    for (tp, fp) in cumulative_counts(y_true, scores) {
        curve.push((ratio(tp, positives), ratio(tp, tp + fp)));
    }
    Ok(curve)
}

/// Trapezoidal area under a curve whose x values never decrease
fn trapezoid(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[1].1 + w[0].1) / 2.0)
        .sum()
}

/// Area under the precision-recall curve
pub fn pr_auc(y_true: &[u8], scores: &[f64]) -> Result<f64> {
    Ok(trapezoid(&precision_recall_curve(y_true, scores)?))
}

/// Area under the ROC curve; tied scores contribute a diagonal segment
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Result<f64> {
    let (positives, negatives) = check_inputs(y_true, scores)?;
    let mut curve = vec![(0.0, 0.0)];
    for (tp, fp) in cumulative_counts(y_true, scores) {
        curve.push((ratio(fp, negatives), ratio(tp, positives)));
    }
    Ok(trapezoid(&curve))
}
