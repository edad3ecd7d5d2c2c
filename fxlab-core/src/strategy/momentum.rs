//! Return-sign strategies over a rolling mean of log returns.
//!
//! Momentum follows the sign of the recent mean return, Contrarian bets
//! against it. A zero mean is neutral for both.

use crate::domain::{Bar, Position, PriceField};
use crate::indicators::{Indicator, LogReturns, Sma};

use super::{price_series, StrategySignalSource};

fn mean_return_signals(
    bars: &[Bar],
    window: &Sma,
    field: PriceField,
    direction: f64,
) -> Vec<Option<Position>> {
    let returns = LogReturns.compute(&price_series(bars, field));
    window
        .compute(&returns)
        .into_iter()
        .map(|mean| (!mean.is_nan()).then(|| Position::from_sign(direction * mean)))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Momentum {
    window: Sma,
    price_field: PriceField,
    name: String,
}

impl Momentum {
    pub fn new(window: usize, price_field: PriceField) -> Self {
        Self {
            window: Sma::new(window),
            price_field,
            name: format!("momentum_{window}"),
        }
    }
}

impl StrategySignalSource for Momentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_bars(&self) -> usize {
        self.window.period() + 1
    }

    fn signals(&self, bars: &[Bar]) -> Vec<Option<Position>> {
        mean_return_signals(bars, &self.window, self.price_field, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct Contrarian {
    window: Sma,
    price_field: PriceField,
    name: String,
}

impl Contrarian {
    pub fn new(window: usize, price_field: PriceField) -> Self {
        Self {
            window: Sma::new(window),
            price_field,
            name: format!("contrarian_{window}"),
        }
    }
}

impl StrategySignalSource for Contrarian {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_bars(&self) -> usize {
        self.window.period() + 1
    }

    fn signals(&self, bars: &[Bar]) -> Vec<Option<Position>> {
        mean_return_signals(bars, &self.window, self.price_field, -1.0)
    }
}
