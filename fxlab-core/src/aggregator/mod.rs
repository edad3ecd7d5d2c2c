//! Tick-to-bar aggregation.
//!
//! The same right-labeled resampling is used for historical backfill
//! (`resample_ticks`) and for the live stream (`BarAggregator`), so a bar
//! built from history and a bar built from streamed ticks are identical.
//! Neither path emits the partial bin before the first boundary.

pub mod resample;
pub mod streaming;

pub use resample::{floor_to_boundary, resample_ticks};
pub use streaming::{AggregationError, AggregationReport, BarAggregator};
