//! Rolling indicators over a price series.
//!
//! Indicators are pure functions: a price series in, a numeric series of the
//! same length out. Warm-up positions are `f64::NAN`, and a NaN anywhere in
//! the window makes that output NaN.
//!
//! # Look-ahead contamination guard
//! No value at index t may depend on prices after t. Every indicator is
//! checked with the truncated-vs-full series test.

pub mod bollinger;
pub mod returns;
pub mod sma;

pub use bollinger::{Bollinger, BollingerBand};
pub use returns::LogReturns;
pub use sma::Sma;

pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20").
    fn name(&self) -> &str;

    /// Number of leading NaN values in the output.
    fn lookback(&self) -> usize;

    /// Compute over the whole series; output has the same length.
    fn compute(&self, series: &[f64]) -> Vec<f64>;
}

/// Bars with bid == ask == `prices[i]`, one minute apart.
#[cfg(test)]
pub fn make_bars(prices: &[f64]) -> Vec<crate::domain::Bar> {
    use chrono::TimeZone;
    let base = chrono::Utc.timestamp_opt(1_700_000_040, 0).unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            crate::domain::Bar::from_quote(base + chrono::Duration::minutes(i as i64), p, p)
                .unwrap()
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
