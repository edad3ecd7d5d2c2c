//! Moving average crossover: long while the short SMA is above the long SMA.
//!
//! Unlike an event-style crossover detector this is a regime signal: every
//! bar gets a target, so a session started mid-trend enters immediately.
//! Equal averages hold the current position.

use crate::domain::{Bar, Position, PriceField};
use crate::indicators::{Indicator, Sma};

use super::{price_series, StrategySignalSource};

#[derive(Debug, Clone)]
pub struct SmaCross {
    short: Sma,
    long: Sma,
    price_field: PriceField,
    name: String,
}

impl SmaCross {
    pub fn new(short_period: usize, long_period: usize, price_field: PriceField) -> Self {
        Self {
            short: Sma::new(short_period),
            long: Sma::new(long_period),
            price_field,
            name: format!("sma_cross_{short_period}_{long_period}"),
        }
    }
}

impl StrategySignalSource for SmaCross {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_bars(&self) -> usize {
        self.long.period()
    }

    fn signals(&self, bars: &[Bar]) -> Vec<Option<Position>> {
        let prices = price_series(bars, self.price_field);
        let short = self.short.compute(&prices);
        let long = self.long.compute(&prices);

        short
            .iter()
            .zip(&long)
            .map(|(&s, &l)| {
                if s.is_nan() || l.is_nan() || s == l {
                    None
                } else if s > l {
                    Some(Position::Long)
                } else {
                    Some(Position::Short)
                }
            })
            .collect()
    }
}
