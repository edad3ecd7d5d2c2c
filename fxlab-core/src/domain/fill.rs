use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution report returned by the order-placement collaborator.
///
/// The broker is authoritative for fill price and realized P/L.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub fill_time: DateTime<Utc>,
    pub fill_price: f64,
    /// Signed units actually filled (positive = bought).
    pub units: i64,
    pub realized_pnl: f64,
}
