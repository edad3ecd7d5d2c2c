//! Bollinger Bands mean reversion.
//!
//! Enter long below the lower band, short above the upper band. An open
//! position is held until the price crosses the moving average (a sign
//! change of `price - sma`), not merely until it re-enters the bands.
//! Neutral before the first entry.

use crate::domain::{Bar, Position, PriceField};
use crate::indicators::{Bollinger, Indicator};

use super::{price_series, StrategySignalSource};

#[derive(Debug, Clone)]
pub struct BollingerBands {
    window: usize,
    middle: Bollinger,
    upper: Bollinger,
    lower: Bollinger,
    price_field: PriceField,
    name: String,
}

impl BollingerBands {
    pub fn new(window: usize, deviation: f64, price_field: PriceField) -> Self {
        Self {
            window,
            middle: Bollinger::middle(window, deviation),
            upper: Bollinger::upper(window, deviation),
            lower: Bollinger::lower(window, deviation),
            price_field,
            name: format!("bollinger_bands_{window}_{deviation}"),
        }
    }
}

impl StrategySignalSource for BollingerBands {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_bars(&self) -> usize {
        self.window
    }

    fn signals(&self, bars: &[Bar]) -> Vec<Option<Position>> {
        let prices = price_series(bars, self.price_field);
        let sma = self.middle.compute(&prices);
        let upper = self.upper.compute(&prices);
        let lower = self.lower.compute(&prices);

        let mut out = Vec::with_capacity(prices.len());
        let mut held = Position::Neutral;
        let mut prev_distance = f64::NAN;

        for i in 0..prices.len() {
            let price = prices[i];
            if sma[i].is_nan() || upper[i].is_nan() || lower[i].is_nan() || price.is_nan() {
                out.push(None);
                prev_distance = f64::NAN;
                continue;
            }

            let distance = price - sma[i];
            if distance * prev_distance < 0.0 {
                held = Position::Neutral;
            } else if price < lower[i] {
                held = Position::Long;
            } else if price > upper[i] {
                held = Position::Short;
            }
            prev_distance = distance;
            out.push(Some(held));
        }

        out
    }
}
