//! Position ledger: cash, units and trade accounting for simulated runs.
//!
//! Every executed order increments the trade count exactly once, whatever
//! its size. Flips are always a single order.

pub mod book;
pub mod order;

pub use book::{LedgerError, PositionLedger};
pub use order::{ExecutionEntry, ExecutionKind, OrderSize, Side};
