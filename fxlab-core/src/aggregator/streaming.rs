//! Streaming bar aggregator for live and replayed tick feeds.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, BarError, Tick};

use super::resample::{floor_to_boundary, resample_ticks};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("out-of-order tick at {timestamp} (last accepted {last})")]
    OutOfOrderTick {
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("invalid tick: {0}")]
    CrossedQuote(#[from] BarError),

    #[error("bar length must be positive, got {0}")]
    InvalidBarLength(Duration),

    #[error("history does not contain one complete bar")]
    InsufficientHistory,
}

/// Running counters, useful for session diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub ticks_ingested: u64,
    pub ticks_rejected: u64,
    pub bars_emitted: u64,
    /// Bars emitted for bins that contained no tick of their own.
    pub forward_filled_bars: u64,
    /// Boundaries crossed before any quote was known (nothing to fill with).
    pub skipped_boundaries: u64,
}

/// Folds ticks into fixed-length, right-labeled bars.
///
/// Invariants:
/// - every pending tick lies in `[last_boundary, last_boundary + bar_length)`
/// - emitted bar timestamps are strictly increasing and `bar_length` apart
#[derive(Debug, Clone)]
pub struct BarAggregator {
    bar_length: Duration,
    last_boundary: Option<DateTime<Utc>>,
    pending: Vec<Tick>,
    /// Last tick of an already finalized bin, used to forward-fill.
    carry: Option<Tick>,
    last_tick: Option<DateTime<Utc>>,
    report: AggregationReport,
}

impl BarAggregator {
    /// Unseeded aggregator. The first (partial) bin of the stream is never
    /// emitted as a bar of its own.
    pub fn new(bar_length: Duration) -> Result<Self, AggregationError> {
        if bar_length <= Duration::zero() {
            return Err(AggregationError::InvalidBarLength(bar_length));
        }
        Ok(Self {
            bar_length,
            last_boundary: None,
            pending: Vec::new(),
            carry: None,
            last_tick: None,
            report: AggregationReport::default(),
        })
    }

    /// Aggregator continuing from already finalized historical bars.
    ///
    /// The history must already exclude its incomplete trailing bar.
    pub fn seeded(bar_length: Duration, history: &[Bar]) -> Result<Self, AggregationError> {
        let mut agg = Self::new(bar_length)?;
        let last = history.last().ok_or(AggregationError::InsufficientHistory)?;
        agg.last_boundary = Some(last.timestamp);
        agg.carry = Some(Tick::new(last.timestamp, last.bid_price, last.ask_price));
        Ok(agg)
    }

    /// Resample fine-grained history and continue from its last complete bar.
    ///
    /// Returns the aggregator together with the complete historical bars.
    /// History ticks after the last complete boundary become the pending
    /// buffer, so the seam bar is re-derived from history plus stream ticks.
    pub fn from_history(
        bar_length: Duration,
        ticks: &[Tick],
    ) -> Result<(Self, Vec<Bar>), AggregationError> {
        let bars = resample_ticks(ticks, bar_length)?;
        let mut agg = Self::seeded(bar_length, &bars)?;
        if let Some(boundary) = agg.last_boundary {
            agg.pending = ticks
                .iter()
                .filter(|t| t.timestamp >= boundary)
                .copied()
                .collect();
            agg.last_tick = ticks.last().map(|t| t.timestamp);
        }
        Ok((agg, bars))
    }

    pub fn bar_length(&self) -> Duration {
        self.bar_length
    }

    pub fn last_boundary(&self) -> Option<DateTime<Utc>> {
        self.last_boundary
    }

    pub fn pending(&self) -> &[Tick] {
        &self.pending
    }

    pub fn report(&self) -> &AggregationReport {
        &self.report
    }

    /// Feed one tick.
    ///
    /// Returns the bars finalized by this tick, oldest first: empty while the
    /// tick stays inside the open bin, usually exactly one bar when it
    /// crosses a boundary, and one forward-filled bar per skipped bin when
    /// the feed was silent for several bar lengths.
    ///
    /// Rejected ticks leave the aggregator untouched.
    pub fn ingest(&mut self, tick: Tick) -> Result<Vec<Bar>, AggregationError> {
        self.screen(&tick)?;
        self.last_tick = Some(tick.timestamp);
        self.report.ticks_ingested += 1;

        let Some(boundary) = self.last_boundary else {
            self.start(tick);
            return Ok(Vec::new());
        };

        if tick.timestamp - boundary < self.bar_length {
            self.pending.push(tick);
            return Ok(Vec::new());
        }

        let newest = self.grid_floor(boundary, tick.timestamp);
        let bars = self.finalize_through(boundary, newest)?;
        self.pending.clear();
        self.pending.push(tick);
        self.last_boundary = Some(newest);
        Ok(bars)
    }

    /// Validate a tick without ingesting it. A rejection is counted in the
    /// report; nothing else changes.
    pub fn screen(&mut self, tick: &Tick) -> Result<(), AggregationError> {
        let checked = self.check(tick);
        if checked.is_err() {
            self.report.ticks_rejected += 1;
        }
        checked
    }

    /// Latest label on the grid anchored at `boundary` that is not after `ts`.
    ///
    /// Seeded history may sit off the epoch grid (OANDA daily candles), so
    /// labels advance in whole bar lengths from the current boundary.
    fn grid_floor(&self, boundary: DateTime<Utc>, ts: DateTime<Utc>) -> DateTime<Utc> {
        let len_ms = self.bar_length.num_milliseconds().max(1);
        let steps = (ts - boundary).num_milliseconds() / len_ms;
        boundary + Duration::milliseconds(steps * len_ms)
    }

    fn check(&self, tick: &Tick) -> Result<(), AggregationError> {
        tick.validate()?;
        if let Some(last) = self.last_tick {
            if tick.timestamp <= last {
                return Err(AggregationError::OutOfOrderTick {
                    timestamp: tick.timestamp,
                    last,
                });
            }
        }
        if let Some(boundary) = self.last_boundary {
            if tick.timestamp < boundary {
                return Err(AggregationError::OutOfOrderTick {
                    timestamp: tick.timestamp,
                    last: boundary,
                });
            }
        }
        Ok(())
    }

    /// First tick of an unseeded stream: the boundary is the first grid
    /// point at or after the tick, so the first emitted bar covers a full bin.
    fn start(&mut self, tick: Tick) {
        let floor = floor_to_boundary(tick.timestamp, self.bar_length);
        let boundary = if floor == tick.timestamp {
            floor
        } else {
            floor + self.bar_length
        };
        self.last_boundary = Some(boundary);
        if tick.timestamp < boundary {
            // Partial bin before the grid: remember the quote, don't emit it.
            self.carry = Some(tick);
        } else {
            self.pending.push(tick);
        }
    }

    fn finalize_through(
        &mut self,
        from: DateTime<Utc>,
        through: DateTime<Utc>,
    ) -> Result<Vec<Bar>, AggregationError> {
        let mut bars = Vec::new();
        let mut cursor = 0;
        let mut label = from + self.bar_length;

        while label <= through {
            let mut own_tick = false;
            while cursor < self.pending.len() && self.pending[cursor].timestamp < label {
                self.carry = Some(self.pending[cursor]);
                own_tick = true;
                cursor += 1;
            }
            match self.carry {
                Some(last) => {
                    bars.push(last.to_bar(label)?);
                    self.report.bars_emitted += 1;
                    if !own_tick {
                        self.report.forward_filled_bars += 1;
                    }
                }
                None => self.report.skipped_boundaries += 1,
            }
            label += self.bar_length;
        }
        Ok(bars)
    }
}
