use thiserror::Error;

use crate::domain::{OrderFill, Tick};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    #[error("order for {units} units of {instrument} rejected: {reason}")]
    BrokerOrderFailure {
        instrument: String,
        units: i64,
        reason: String,
    },

    #[error("broker unreachable: {0}")]
    Connectivity(String),
}

/// Order-placement collaborator.
///
/// The broker is authoritative: fill price, filled units and realized P/L
/// come back in the `OrderFill` and are never recomputed locally.
pub trait OrderSink {
    /// Submit a market order for `units` (positive buys, negative sells).
    fn create_order(&mut self, instrument: &str, units: i64) -> Result<OrderFill, BrokerError>;

    /// Called with every tick before it is processed. Simulated brokers use
    /// it to track the quote they fill at.
    fn observe_tick(&mut self, _tick: &Tick) {}
}

impl<S: OrderSink + ?Sized> OrderSink for Box<S> {
    fn create_order(&mut self, instrument: &str, units: i64) -> Result<OrderFill, BrokerError> {
        (**self).create_order(instrument, units)
    }

    fn observe_tick(&mut self, tick: &Tick) {
        (**self).observe_tick(tick)
    }
}
