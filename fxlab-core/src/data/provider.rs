//! Historical data provider trait and structured error types.
//!
//! The `MarketDataSource` trait abstracts over the broker's history endpoint
//! so the engine can be driven by a live API, a CSV import, or a test mock.
//! Connection handling, authentication and rate limits live behind it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BarError, Granularity};

/// Which side of the book a price series is quoted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSide {
    #[serde(rename = "B")]
    Bid,
    #[serde(rename = "A")]
    Ask,
    #[serde(rename = "M")]
    Mid,
}

impl PriceSide {
    pub fn code(self) -> &'static str {
        match self {
            PriceSide::Bid => "B",
            PriceSide::Ask => "A",
            PriceSide::Mid => "M",
        }
    }
}

/// Closing price of one candle on one side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Arguments of a history request.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest<'a> {
    pub instrument: &'a str,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("instrument not found: {instrument}")]
    InstrumentNotFound { instrument: String },

    #[error("no data returned for {instrument} between {start} and {end}")]
    Empty {
        instrument: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("invalid data: {0}")]
    Invalid(String),

    #[error(transparent)]
    Quality(#[from] BarError),

    #[error("data error: {0}")]
    Other(String),
}

/// Source of historical candles.
///
/// Treated as a pure function of its arguments: repeated calls with the same
/// request return the same series, ordered by timestamp.
pub trait MarketDataSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn get_history(
        &self,
        request: &HistoryRequest<'_>,
        side: PriceSide,
    ) -> Result<Vec<PricePoint>, DataError>;
}
