//! Market data collaborator contract and quote assembly.

pub mod provider;
pub mod quotes;

pub use provider::{DataError, HistoryRequest, MarketDataSource, PricePoint, PriceSide};
pub use quotes::{bars_from_quotes, fetch_bars, fetch_ticks, ticks_from_quotes};
