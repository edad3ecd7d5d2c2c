//! Logistic-regression direction classifier on lagged log returns.
//!
//! The model is fitted on the leading `training_bars` bars and predicts the
//! sign of the next return from the last `lags` returns. No signal is
//! produced until the whole training window is in the past, so the fit
//! never sees a bar later than the one being evaluated.

use crate::domain::{Bar, Position, PriceField};
use crate::indicators::{Indicator, LogReturns};

use super::{price_series, StrategySignalSource};

/// Binary logistic regression trained by batch gradient descent on
/// standardized features.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
    means: Vec<f64>,
    scales: Vec<f64>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticModel {
    /// Fit on `features` (one row per sample) against `labels` in `{0, 1}`.
    pub fn fit(features: &[Vec<f64>], labels: &[f64], learning_rate: f64, iterations: usize) -> Self {
        let dims = features.first().map_or(0, Vec::len);
        let m = features.len().max(1) as f64;

        let mut means = vec![0.0; dims];
        let mut scales = vec![1.0; dims];
        for d in 0..dims {
            let mean = features.iter().map(|row| row[d]).sum::<f64>() / m;
            let var = features.iter().map(|row| (row[d] - mean).powi(2)).sum::<f64>() / m;
            means[d] = mean;
            if var > 0.0 {
                scales[d] = var.sqrt();
            }
        }

        let standardized: Vec<Vec<f64>> = features
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(d, x)| (x - means[d]) / scales[d])
                    .collect()
            })
            .collect();

        let mut weights = vec![0.0; dims];
        let mut bias = 0.0;
        for _ in 0..iterations {
            let mut grad_w = vec![0.0; dims];
            let mut grad_b = 0.0;
            for (row, &y) in standardized.iter().zip(labels) {
                let z = bias + row.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>();
                let err = sigmoid(z) - y;
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_b += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= learning_rate * g / m;
            }
            bias -= learning_rate * grad_b / m;
        }

        Self {
            weights,
            bias,
            means,
            scales,
        }
    }

    /// Probability that the next return is positive.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let z = self.bias
            + row
                .iter()
                .enumerate()
                .map(|(d, x)| (x - self.means[d]) / self.scales[d] * self.weights[d])
                .sum::<f64>();
        sigmoid(z)
    }
}

/// `[r_t, r_{t-1}, ..., r_{t-lags+1}]`, or None if any is missing.
pub(super) fn lagged_returns(returns: &[f64], t: usize, lags: usize) -> Option<Vec<f64>> {
    if t + 1 < lags {
        return None;
    }
    let row: Vec<f64> = (0..lags).map(|k| returns[t - k]).collect();
    row.iter().all(|v| v.is_finite()).then_some(row)
}

#[derive(Debug, Clone)]
pub struct MlClassification {
    lags: usize,
    training_bars: usize,
    learning_rate: f64,
    iterations: usize,
    price_field: PriceField,
    name: String,
}

impl MlClassification {
    pub fn new(
        lags: usize,
        training_bars: usize,
        learning_rate: f64,
        iterations: usize,
        price_field: PriceField,
    ) -> Self {
        Self {
            lags,
            training_bars,
            learning_rate,
            iterations,
            price_field,
            name: format!("ml_classification_{lags}_{training_bars}"),
        }
    }

    fn features_at(&self, returns: &[f64], t: usize) -> Option<Vec<f64>> {
        lagged_returns(returns, t, self.lags)
    }

    /// Fit on samples whose target return lies inside the training window.
    pub fn fit(&self, bars: &[Bar]) -> Option<LogisticModel> {
        if bars.len() < self.training_bars {
            return None;
        }
        let returns = LogReturns.compute(&price_series(&bars[..self.training_bars], self.price_field));

        let mut features = Vec::new();
        let mut labels = Vec::new();
        for t in 0..self.training_bars.saturating_sub(1) {
            let target = returns[t + 1];
            if let (Some(row), true) = (self.features_at(&returns, t), target.is_finite()) {
                features.push(row);
                labels.push(if target > 0.0 { 1.0 } else { 0.0 });
            }
        }
        if features.is_empty() {
            return None;
        }
        Some(LogisticModel::fit(
            &features,
            &labels,
            self.learning_rate,
            self.iterations,
        ))
    }
}

impl StrategySignalSource for MlClassification {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_bars(&self) -> usize {
        self.training_bars
    }

    fn signals(&self, bars: &[Bar]) -> Vec<Option<Position>> {
        let mut out = vec![None; bars.len()];
        let Some(model) = self.fit(bars) else {
            return out;
        };

        let returns = LogReturns.compute(&price_series(bars, self.price_field));
        for (t, slot) in out.iter_mut().enumerate().skip(self.training_bars.saturating_sub(1)) {
            if let Some(row) = self.features_at(&returns, t) {
                *slot = Some(if model.predict_proba(&row) >= 0.5 {
                    Position::Long
                } else {
                    Position::Short
                });
            }
        }
        out
    }
}
