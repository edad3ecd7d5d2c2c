//! Scoped live trading session.
//!
//! `LiveSession::open` seeds the aggregator from fine-grained history and
//! `LiveSession::run` drives the tick stream. Whatever ends the stream (a
//! stop condition, stream exhaustion or an error), the open position is
//! closed before `run` returns.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::aggregator::{AggregationReport, BarAggregator};
use crate::data::{fetch_ticks, HistoryRequest, MarketDataSource};
use crate::domain::{Granularity, OrderFill, Position, Tick};
use crate::strategy::StrategySignalSource;

use super::dispatcher::{DispatchConfig, DispatchState, LiveDispatcher};
use super::broker::OrderSink;
use super::market_hours::MarketHours;
use super::stops::StopReason;
use super::LiveError;

/// Source of the current time, injected so sessions can be replayed.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub dispatch: DispatchConfig,
    pub bar_length: Duration,
    /// Granularity of the seeding history; must be finer than `bar_length`.
    pub history_granularity: Granularity,
    pub history_lookback: Duration,
    pub max_history_attempts: usize,
    pub market_hours: MarketHours,
    pub ignore_market_hours: bool,
}

impl LiveConfig {
    pub fn new(dispatch: DispatchConfig, bar_length: Duration) -> Self {
        Self {
            dispatch,
            bar_length,
            history_granularity: Granularity::S5,
            history_lookback: Duration::days(1),
            max_history_attempts: 10,
            market_hours: MarketHours::fx(),
            ignore_market_hours: false,
        }
    }
}

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub instrument: String,
    pub stop_reason: StopReason,
    pub final_position: Position,
    pub profit: f64,
    pub orders: usize,
    pub fills: Vec<OrderFill>,
    pub dropped_ticks: u64,
    pub aggregation: AggregationReport,
}

pub struct LiveSession<S: OrderSink> {
    dispatcher: LiveDispatcher<S>,
    dropped_ticks: u64,
}

impl<S: OrderSink> LiveSession<S> {
    /// Check market hours, seed from history and build the dispatcher.
    ///
    /// History is refetched until its last complete bar is less than one bar
    /// length old, so no boundary bar falls between history and stream.
    pub fn open(
        config: LiveConfig,
        source: &dyn MarketDataSource,
        sink: S,
        strategy: Box<dyn StrategySignalSource>,
        clock: &dyn Clock,
    ) -> Result<Self, LiveError> {
        let now = clock.now();
        if !config.ignore_market_hours && !config.market_hours.is_open(now) {
            return Err(LiveError::MarketClosed { at: now });
        }
        if config.max_history_attempts == 0 {
            return Err(LiveError::InvalidConfig(
                "max_history_attempts must be >= 1".into(),
            ));
        }

        for attempt in 1..=config.max_history_attempts {
            let now = clock.now();
            let request = HistoryRequest {
                instrument: &config.dispatch.instrument,
                start: now - config.history_lookback,
                end: now,
                granularity: config.history_granularity,
            };
            let ticks = fetch_ticks(source, &request)?;
            let (aggregator, history) = BarAggregator::from_history(config.bar_length, &ticks)?;

            let fresh = aggregator
                .last_boundary()
                .is_some_and(|last| clock.now() - last < config.bar_length);
            if fresh {
                info!(
                    instrument = %config.dispatch.instrument,
                    bars = history.len(),
                    attempt,
                    "history seeded, opening stream"
                );
                let dispatcher =
                    LiveDispatcher::new(config.dispatch, sink, strategy, aggregator, history)?;
                return Ok(Self {
                    dispatcher,
                    dropped_ticks: 0,
                });
            }
            debug!(attempt, "history seam stale, refetching");
        }

        Err(LiveError::StaleHistory {
            attempts: config.max_history_attempts,
        })
    }

    /// Session over an already seeded dispatcher (replays, tests).
    pub fn from_dispatcher(dispatcher: LiveDispatcher<S>) -> Self {
        Self {
            dispatcher,
            dropped_ticks: 0,
        }
    }

    pub fn dispatcher(&self) -> &LiveDispatcher<S> {
        &self.dispatcher
    }

    pub fn into_dispatcher(self) -> LiveDispatcher<S> {
        self.dispatcher
    }

    /// Drive ticks until a stop condition fires or the stream ends.
    ///
    /// Out-of-order and crossed ticks are dropped with a warning. The
    /// position is closed on every exit path; an error is returned after
    /// the close attempt.
    pub fn run<I>(&mut self, ticks: I) -> Result<SessionSummary, LiveError>
    where
        I: IntoIterator<Item = Tick>,
    {
        let span = info_span!("live_session", instrument = %self.dispatcher.config().instrument);
        let _guard = span.enter();

        let outcome = self.drive(ticks);

        let reason = match (&outcome, self.dispatcher.state()) {
            (_, DispatchState::Stopped(reason)) => reason,
            (Ok(()), DispatchState::Running) => StopReason::StreamEnded,
            (Err(_), DispatchState::Running) => StopReason::Error,
        };
        let closed = self.dispatcher.close_position(reason);

        outcome?;
        closed?;
        Ok(self.summary(reason))
    }

    fn drive<I>(&mut self, ticks: I) -> Result<(), LiveError>
    where
        I: IntoIterator<Item = Tick>,
    {
        for tick in ticks {
            match self.dispatcher.on_tick(tick) {
                Ok(DispatchState::Stopped(_)) => break,
                Ok(DispatchState::Running) => {}
                Err(LiveError::Aggregation(err)) => {
                    warn!(%err, "dropping tick");
                    self.dropped_ticks += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn summary(&self, reason: StopReason) -> SessionSummary {
        let d = &self.dispatcher;
        SessionSummary {
            instrument: d.config().instrument.clone(),
            stop_reason: reason,
            final_position: d.position(),
            profit: d.profit(),
            orders: d.fills().len(),
            fills: d.fills().to_vec(),
            dropped_ticks: self.dropped_ticks,
            aggregation: d.aggregation_report().clone(),
        }
    }
}
