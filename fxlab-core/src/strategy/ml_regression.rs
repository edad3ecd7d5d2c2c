//! Linear-regression return predictor on lagged log returns.
//!
//! Ordinary least squares with an intercept, fitted on the leading
//! `training_bars`. The position follows the sign of the predicted next
//! return; a prediction of exactly zero holds.

use crate::domain::{Bar, Position, PriceField};
use crate::indicators::{Indicator, LogReturns};

use super::ml_classification::lagged_returns;
use super::{price_series, StrategySignalSource};

/// Fitted coefficients, intercept first.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    coefficients: Vec<f64>,
}

impl LinearModel {
    /// Least-squares fit of `targets` on `features` plus an intercept.
    ///
    /// Returns None when the normal equations are singular (e.g. a
    /// constant feature column).
    pub fn fit(features: &[Vec<f64>], targets: &[f64]) -> Option<Self> {
        let dims = features.first().map_or(0, Vec::len) + 1;
        let mut xtx = vec![vec![0.0; dims]; dims];
        let mut xty = vec![0.0; dims];
        for (row, &y) in features.iter().zip(targets) {
            let x: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
            for i in 0..dims {
                xty[i] += x[i] * y;
                for j in 0..dims {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }
        solve(xtx, xty).map(|coefficients| Self { coefficients })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.coefficients[0]
            + row
                .iter()
                .zip(&self.coefficients[1..])
                .map(|(x, b)| x * b)
                .sum::<f64>()
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let scale = a
        .iter()
        .flatten()
        .fold(0.0_f64, |m, v| m.max(v.abs()))
        .max(f64::MIN_POSITIVE);
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= scale * 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[derive(Debug, Clone)]
pub struct MlRegression {
    lags: usize,
    training_bars: usize,
    price_field: PriceField,
    name: String,
}

impl MlRegression {
    pub fn new(lags: usize, training_bars: usize, price_field: PriceField) -> Self {
        Self {
            lags,
            training_bars,
            price_field,
            name: format!("ml_regression_{lags}_{training_bars}"),
        }
    }

    pub fn fit(&self, bars: &[Bar]) -> Option<LinearModel> {
        if bars.len() < self.training_bars {
            return None;
        }
        let returns = LogReturns.compute(&price_series(&bars[..self.training_bars], self.price_field));

        let mut features = Vec::new();
        let mut targets = Vec::new();
        for t in 0..self.training_bars.saturating_sub(1) {
            let target = returns[t + 1];
            if let (Some(row), true) = (lagged_returns(&returns, t, self.lags), target.is_finite()) {
                features.push(row);
                targets.push(target);
            }
        }
        if features.len() <= self.lags {
            return None;
        }
        LinearModel::fit(&features, &targets)
    }
}

impl StrategySignalSource for MlRegression {
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
            if let Some(row) = lagged_returns(&returns, t, self.lags) {
                let predicted = model.predict(&row);
                if predicted != 0.0 {
                    *slot = Some(Position::from_sign(predicted));
                }
            }
        }
        out
    }
}
