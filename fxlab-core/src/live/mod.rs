//! Live trading: the order-placement seam, stop conditions, the tick
//! dispatcher and the scoped session around it.

pub mod broker;
pub mod dispatcher;
pub mod market_hours;
pub mod session;
pub mod stops;

pub use broker::{BrokerError, OrderSink};
pub use dispatcher::{DispatchConfig, DispatchState, LiveDispatcher, DEFAULT_MAX_BARS};
pub use market_hours::MarketHours;
pub use session::{Clock, LiveConfig, LiveSession, SessionSummary, SystemClock};
pub use stops::{StopConditions, StopReason};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::aggregator::AggregationError;
use crate::data::DataError;
use crate::strategy::StrategyError;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("history unavailable: {0}")]
    Data(#[from] DataError),

    #[error("market closed at {at}")]
    MarketClosed { at: DateTime<Utc> },

    #[error("history still stale after {attempts} attempts")]
    StaleHistory { attempts: usize },

    #[error("invalid live config: {0}")]
    InvalidConfig(String),
}
