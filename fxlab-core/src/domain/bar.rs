//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Data-quality violations in bar or tick input.
///
/// These are never silently clamped: a negative spread or a non-increasing
/// timestamp means the upstream data is broken.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("negative spread at {timestamp}: bid {bid} > ask {ask}")]
    NegativeSpread {
        timestamp: DateTime<Utc>,
        bid: f64,
        ask: f64,
    },

    #[error("non-finite price at {timestamp}")]
    NonFinite { timestamp: DateTime<Utc> },

    #[error("bar {index} at {timestamp} does not strictly follow its predecessor")]
    NotIncreasing {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Which quote a strategy reads its price series from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    #[default]
    Bid,
    Ask,
    Mid,
}

/// Right-labeled price bar for a single instrument.
///
/// The bar labeled `timestamp` carries the last quote observed strictly
/// before `timestamp`. `spread == ask_price - bid_price` and is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub bid_price: f64,
    pub ask_price: f64,
    pub mid_price: f64,
    pub spread: f64,
}

impl Bar {
    /// Build a bar from a bid/ask quote, rejecting crossed or non-finite quotes.
    pub fn from_quote(timestamp: DateTime<Utc>, bid: f64, ask: f64) -> Result<Self, BarError> {
        if !bid.is_finite() || !ask.is_finite() {
            return Err(BarError::NonFinite { timestamp });
        }
        if ask < bid {
            return Err(BarError::NegativeSpread { timestamp, bid, ask });
        }
        Ok(Self {
            timestamp,
            bid_price: bid,
            ask_price: ask,
            mid_price: (bid + ask) / 2.0,
            spread: ask - bid,
        })
    }

    /// Price on the requested side of the quote.
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Bid => self.bid_price,
            PriceField::Ask => self.ask_price,
            PriceField::Mid => self.mid_price,
        }
    }

    /// Copy of this bar relabeled at `timestamp` (used for forward-filled bars).
    pub fn relabel(&self, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, ..*self }
    }
}

/// Check a bar sequence for strictly increasing timestamps and sane spreads.
pub fn validate_bars(bars: &[Bar]) -> Result<(), BarError> {
    for (index, bar) in bars.iter().enumerate() {
        if !bar.bid_price.is_finite() || !bar.ask_price.is_finite() {
            return Err(BarError::NonFinite {
                timestamp: bar.timestamp,
            });
        }
        if bar.spread < 0.0 {
            return Err(BarError::NegativeSpread {
                timestamp: bar.timestamp,
                bid: bar.bid_price,
                ask: bar.ask_price,
            });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(BarError::NotIncreasing {
                index,
                timestamp: bar.timestamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn from_quote_derives_mid_and_spread() {
        let bar = Bar::from_quote(ts(0), 1.1000, 1.1002).unwrap();
        assert!((bar.mid_price - 1.1001).abs() < 1e-12);
        assert!((bar.spread - 0.0002).abs() < 1e-12);
    }

    #[test]
    fn crossed_quote_is_rejected() {
        let err = Bar::from_quote(ts(0), 1.2, 1.1).unwrap_err();
        assert!(matches!(err, BarError::NegativeSpread { .. }));
    }

    #[test]
    fn nan_quote_is_rejected() {
        let err = Bar::from_quote(ts(0), f64::NAN, 1.1).unwrap_err();
        assert!(matches!(err, BarError::NonFinite { .. }));
    }

    #[test]
    fn validate_detects_duplicate_timestamps() {
        let a = Bar::from_quote(ts(0), 1.0, 1.0).unwrap();
        let b = a.relabel(ts(0));
        let err = validate_bars(&[a, b]).unwrap_err();
        assert_eq!(
            err,
            BarError::NotIncreasing {
                index: 1,
                timestamp: ts(0)
            }
        );
    }

    #[test]
    fn validate_accepts_increasing_sequence() {
        let a = Bar::from_quote(ts(0), 1.0, 1.0001).unwrap();
        let b = a.relabel(ts(0) + Duration::seconds(60));
        assert!(validate_bars(&[a, b]).is_ok());
    }

    #[test]
    fn price_field_selects_side() {
        let bar = Bar::from_quote(ts(0), 1.0, 1.2).unwrap();
        assert_eq!(bar.price(PriceField::Bid), 1.0);
        assert_eq!(bar.price(PriceField::Ask), 1.2);
        assert!((bar.price(PriceField::Mid) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = Bar::from_quote(ts(5), 1.3, 1.31).unwrap();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
