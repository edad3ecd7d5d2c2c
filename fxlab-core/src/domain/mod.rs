//! Domain types for FxLab

pub mod bar;
pub mod fill;
pub mod granularity;
pub mod position;
pub mod tick;

pub use bar::{validate_bars, Bar, BarError, PriceField};
pub use fill::OrderFill;
pub use granularity::{parse_bar_length, Granularity, GranularityError};
pub use position::Position;
pub use tick::Tick;

/// Instrument name alias (e.g. "EUR_USD").
pub type Instrument = String;
