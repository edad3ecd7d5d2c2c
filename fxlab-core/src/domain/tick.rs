//! Tick: a single raw quote from the market feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bar::{Bar, BarError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, bid: f64, ask: f64) -> Self {
        Self { timestamp, bid, ask }
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Finite, uncrossed quote.
    pub fn validate(&self) -> Result<(), BarError> {
        Bar::from_quote(self.timestamp, self.bid, self.ask).map(|_| ())
    }

    /// The bar this tick closes when it is the last one before `label`.
    pub fn to_bar(&self, label: DateTime<Utc>) -> Result<Bar, BarError> {
        Bar::from_quote(label, self.bid, self.ask)
    }
}
