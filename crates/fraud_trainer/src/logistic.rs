//! L2-regularized logistic regression, fit by full-batch gradient descent
//!
//! The objective matches the usual `C`-parameterized form scaled by `1 / (C n)`:
//! mean log loss plus `|w|^2 / (2 C n)`. The intercept is not penalized.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TrainerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    pub max_iter: usize,
    /// Initial step size; backtracking halves it when a step overshoots
    pub learning_rate: f64,
    /// Inverse regularization strength
    pub c: f64,
    /// Stop once the largest gradient component falls below this
    pub tolerance: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            learning_rate: 0.5,
            c: 1.0,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub intercept: f64,
    pub iterations: usize,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// log(1 + e^z) without overflow
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

fn dot(weights: &[f64], row: &[f64]) -> f64 {
    weights.iter().zip(row).map(|(w, x)| w * x).sum()
}

/// Mean log loss plus the L2 penalty `|w|^2 / (2 C n)`
fn objective(weights: &[f64], intercept: f64, rows: &[Vec<f64>], labels: &[u8], c: f64) -> f64 {
    let n = rows.len() as f64;
    let data: f64 = rows
        .iter()
        .zip(labels)
        .map(|(row, &label)| {
            let z = dot(weights, row) + intercept;
            softplus(z) - f64::from(label) * z
        })
        .sum();
    let penalty: f64 = weights.iter().map(|w| w * w).sum();
    data / n + penalty / (2.0 * c * n)
}

/// Gradient of `objective` with respect to (weights, intercept)
fn gradient(weights: &[f64], intercept: f64, rows: &[Vec<f64>], labels: &[u8], c: f64) -> (Vec<f64>, f64) {
    let n = rows.len() as f64;
    let mut grad_w = vec![0.0; weights.len()];
    let mut grad_b = 0.0;
    for (row, &label) in rows.iter().zip(labels) {
        let err = sigmoid(dot(weights, row) + intercept) - f64::from(label);
        for (g, x) in grad_w.iter_mut().zip(row) {
            *g += err * x;
        }
        grad_b += err;
    }
    for (g, w) in grad_w.iter_mut().zip(weights) {
        *g = *g / n + w / (c * n);
    }
    (grad_w, grad_b / n)
}

impl LogisticModel {
    /// Gradient descent with backtracking: a step that does not lower the
    /// objective enough is halved until it does
    pub fn fit(config: &LogisticConfig, rows: &[Vec<f64>], labels: &[u8]) -> Result<Self> {
        if rows.is_empty() || rows.len() != labels.len() {
            return Err(TrainerError::InsufficientData(format!(
                "{} rows with {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if !(config.c > 0.0 && config.learning_rate > 0.0) {
            return Err(TrainerError::InvalidParameter(
                "c and learning_rate must be positive".into(),
            ));
        }

        let c = config.c;
        let mut weights = vec![0.0; rows[0].len()];
        let mut intercept = 0.0;
        let mut iterations = 0;
        let mut step = config.learning_rate;
        let mut loss = objective(&weights, intercept, rows, labels, c);

        for _ in 0..config.max_iter {
            let (grad_w, grad_b) = gradient(&weights, intercept, rows, labels, c);
            let max_grad = grad_w.iter().fold(grad_b.abs(), |m, g| m.max(g.abs()));
            if max_grad < config.tolerance {
                break;
            }
            let grad_sq = grad_w.iter().map(|g| g * g).sum::<f64>() + grad_b * grad_b;

            loop {
                let candidate: Vec<f64> = weights.iter().zip(&grad_w).map(|(w, g)| w - step * g).collect();
                let candidate_b = intercept - step * grad_b;
                let candidate_loss = objective(&candidate, candidate_b, rows, labels, c);
                if candidate_loss <= loss - 0.5 * step * grad_sq || step < 1e-12 {
                    weights = candidate;
                    intercept = candidate_b;
                    loss = candidate_loss;
                    break;
                }
                step *= 0.5;
            }
            step *= 2.0;
            iterations += 1;
        }

        if iterations == config.max_iter {
            tracing::debug!("Logistic regression hit max_iter={}", config.max_iter);
        }
        Ok(Self {
            weights,
            intercept,
            iterations,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(dot(&self.weights, row) + self.intercept)
    }
}
