use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::logistic_defaults;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    /// L2 penalty on weights (intercept is not penalized).
    pub l2: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            learning_rate: logistic_defaults::LEARNING_RATE,
            epochs: logistic_defaults::EPOCHS,
            l2: logistic_defaults::L2,
        }
    }
}

/// Binary logistic regression fitted with full-batch gradient descent.
/// No randomness: identical inputs give bit-identical parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>, cfg: &LogisticConfig) -> Result<Self> {
        let (n, d) = x.dim();
        if n == 0 || n != y.len() {
            return Err(AppError::Training(format!(
                "logistic regression needs matching non-empty inputs (rows={n}, targets={})",
                y.len()
            )));
        }

        let mut w = Array1::<f64>::zeros(d);
        let mut b = 0.0;
        let inv_n = 1.0 / n as f64;

        for epoch in 0..cfg.epochs {
            let logits = x.dot(&w) + b;
            let residual = logits.mapv(sigmoid) - &y;
            let grad_w = x.t().dot(&residual) * inv_n + &w * cfg.l2;
            let grad_b = residual.sum() * inv_n;
            w = w - grad_w * cfg.learning_rate;
            b -= grad_b * cfg.learning_rate;

            if epoch % 500 == 0 {
                debug!(epoch, loss = log_loss(x, y, &w, b), "[TRAIN] logistic regression");
            }
        }

        if !w.iter().all(|v| v.is_finite()) || !b.is_finite() {
            return Err(AppError::Training("logistic regression diverged".to_string()));
        }

        Ok(Self { weights: w.to_vec(), intercept: b })
    }

    /// Log-odds for an already-transformed row.
    pub fn decision(&self, row: &[f64]) -> f64 {
        self.intercept + self.weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>()
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision(row))
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn log_loss(x: ArrayView2<f64>, y: ArrayView1<f64>, w: &Array1<f64>, b: f64) -> f64 {
    let eps = 1e-12;
    let p = (x.dot(w) + b).mapv(sigmoid);
    let total: f64 = p
        .iter()
        .zip(y.iter())
        .map(|(p, y)| -(y * (p + eps).ln() + (1.0 - y) * (1.0 - p + eps).ln()))
        .sum();
    total / y.len() as f64
}
