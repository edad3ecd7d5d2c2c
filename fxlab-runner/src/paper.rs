//! Paper broker: a simulated `OrderSink` for tick replays.
//!
//! Orders fill immediately at the most recently observed quote: buys at the
//! ask, sells at the bid. Realized P/L is reported for the part of an order
//! that reduces the open position, against its average entry price.

use tracing::debug;

use fxlab_core::domain::{OrderFill, Tick};
use fxlab_core::live::{BrokerError, OrderSink};

#[derive(Debug, Clone, Default)]
pub struct PaperBroker {
    last: Option<Tick>,
    units: i64,
    avg_price: f64,
    realized: f64,
    orders: usize,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> i64 {
        self.units
    }

    pub fn avg_price(&self) -> f64 {
        self.avg_price
    }

    /// Cumulative realized P/L across all fills.
    pub fn realized_pnl(&self) -> f64 {
        self.realized
    }

    pub fn order_count(&self) -> usize {
        self.orders
    }

    /// Returns the P/L realized by this fill.
    fn apply(&mut self, units: i64, price: f64) -> f64 {
        let before = self.units;
        let after = before + units;

        let mut pnl = 0.0;
        if before != 0 && before.signum() != units.signum() {
            let closed = units.abs().min(before.abs());
            pnl = closed as f64 * (price - self.avg_price) * before.signum() as f64;
        }

        if after == 0 {
            self.avg_price = 0.0;
        } else if before == 0 || before.signum() != after.signum() {
            self.avg_price = price;
        } else if after.abs() > before.abs() {
            self.avg_price = (self.avg_price * before.abs() as f64 + price * units.abs() as f64)
                / after.abs() as f64;
        }

        self.units = after;
        self.realized += pnl;
        pnl
    }
}

impl OrderSink for PaperBroker {
    fn create_order(&mut self, instrument: &str, units: i64) -> Result<OrderFill, BrokerError> {
        if units == 0 {
            return Err(BrokerError::BrokerOrderFailure {
                instrument: instrument.to_string(),
                units,
                reason: "order for zero units".into(),
            });
        }
        let quote = self
            .last
            .ok_or_else(|| BrokerError::Connectivity("no quote observed yet".into()))?;
        let price = if units > 0 { quote.ask } else { quote.bid };

        let realized_pnl = self.apply(units, price);
        self.orders += 1;
        debug!(instrument, units, price, realized_pnl, "paper fill");

        Ok(OrderFill {
            fill_time: quote.timestamp,
            fill_price: price,
            units,
            realized_pnl,
        })
    }

    fn observe_tick(&mut self, tick: &Tick) {
        self.last = Some(*tick);
    }
}
