//! Session stop conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a live session stopped trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    StopDatetime,
    StopLoss,
    StopProfit,
    BrokerFailure,
    StreamEnded,
    Error,
}

/// Thresholds checked before each tick, in a fixed order: datetime, loss,
/// profit. Profit is the cumulative realized P/L reported by the broker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopConditions {
    #[serde(default)]
    pub stop_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub stop_profit: Option<f64>,
}

impl StopConditions {
    pub fn none() -> Self {
        Self::default()
    }

    /// First condition that holds at `now` with cumulative `profit`.
    pub fn check(&self, now: DateTime<Utc>, profit: f64) -> Option<StopReason> {
        if self.stop_datetime.is_some_and(|at| now >= at) {
            return Some(StopReason::StopDatetime);
        }
        if self.stop_loss.is_some_and(|limit| profit < limit) {
            return Some(StopReason::StopLoss);
        }
        if self.stop_profit.is_some_and(|limit| profit > limit) {
            return Some(StopReason::StopProfit);
        }
        None
    }

    /// Loss threshold must sit below the profit threshold.
    pub fn is_consistent(&self) -> bool {
        match (self.stop_loss, self.stop_profit) {
            (Some(loss), Some(profit)) => loss < profit,
            _ => true,
        }
    }
}
