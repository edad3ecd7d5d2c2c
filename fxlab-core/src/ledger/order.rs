use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// `+1` for buys, `-1` for sells.
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

/// How many units an order should carry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OrderSize {
    /// Exact unit count.
    Units(i64),
    /// Currency amount, converted at the execution price and truncated.
    Amount(f64),
    /// Whole available balance at the execution price.
    All,
}

/// What kind of ledger operation produced an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    Order,
    Close,
}

/// One line of the ledger's execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ExecutionKind,
    pub side: Side,
    /// Units transacted, always positive.
    pub units: i64,
    pub price: f64,
    pub cash_after: f64,
    pub units_after: i64,
    /// P/L realized by the part of this order that reduced exposure.
    pub realized_pnl: Option<f64>,
}
