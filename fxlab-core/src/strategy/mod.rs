//! Strategy signal sources: bar history in, target position per bar out.
//!
//! Strategies are portfolio-agnostic: they never see cash, units or fills.
//! The same source drives the iterative simulator, the vectorized backtest
//! and the live dispatcher.

pub mod bollinger;
pub mod ml_classification;
pub mod ml_regression;
pub mod momentum;
pub mod params;
pub mod sma_cross;

pub use bollinger::BollingerBands;
pub use ml_classification::{LogisticModel, MlClassification};
pub use ml_regression::{LinearModel, MlRegression};
pub use momentum::{Contrarian, Momentum};
pub use params::StrategyParams;
pub use sma_cross::SmaCross;

use thiserror::Error;

use crate::domain::{Bar, Position, PriceField};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("invalid {strategy} parameters: {reason}")]
    InvalidParameterRange {
        strategy: &'static str,
        reason: String,
    },

    #[error("warm-up incomplete: {required} bars required, {available} available")]
    WarmupIncomplete { required: usize, available: usize },
}

/// Trait for strategy signal sources.
///
/// # Look-ahead contamination guard
/// `signals(bars)[t]` may only depend on `bars[..=t]`: evaluating a
/// truncated history must reproduce the prefix of the full evaluation.
pub trait StrategySignalSource: Send + Sync {
    /// Human-readable name including parameters (e.g. "sma_cross_50_200").
    fn name(&self) -> &str;

    /// Bars needed before the first signal can be produced.
    fn warmup_bars(&self) -> usize;

    /// Target position for every bar. `None` means "no opinion": warm-up,
    /// or a tie the strategy resolves by holding.
    fn signals(&self, bars: &[Bar]) -> Vec<Option<Position>>;

    /// Target position for the most recent bar.
    fn latest_signal(&self, bars: &[Bar]) -> Result<Option<Position>, StrategyError> {
        if bars.len() < self.warmup_bars() {
            return Err(StrategyError::WarmupIncomplete {
                required: self.warmup_bars(),
                available: bars.len(),
            });
        }
        Ok(self.signals(bars).last().copied().flatten())
    }
}

pub(crate) fn price_series(bars: &[Bar], field: PriceField) -> Vec<f64> {
    bars.iter().map(|b| b.price(field)).collect()
}
