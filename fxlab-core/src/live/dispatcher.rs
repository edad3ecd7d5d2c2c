//! Push-model dispatcher: ticks -> bars -> signal -> broker orders.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::aggregator::{AggregationReport, BarAggregator};
use crate::domain::{Bar, OrderFill, Position, Tick};
use crate::strategy::{StrategyError, StrategySignalSource};

use super::broker::{BrokerError, OrderSink};
use super::stops::{StopConditions, StopReason};
use super::LiveError;

pub const DEFAULT_MAX_BARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum DispatchState {
    Running,
    /// Terminal: no further orders are placed.
    Stopped(StopReason),
}

impl DispatchState {
    pub fn is_stopped(self) -> bool {
        matches!(self, DispatchState::Stopped(_))
    }
}

/// Per-session trading parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub instrument: String,
    /// Position size; flips trade twice this.
    pub units: i64,
    pub stops: StopConditions,
    /// Rolling bar window handed to the strategy.
    pub max_bars: usize,
}

impl DispatchConfig {
    pub fn new(instrument: impl Into<String>, units: i64) -> Self {
        Self {
            instrument: instrument.into(),
            units,
            stops: StopConditions::none(),
            max_bars: DEFAULT_MAX_BARS,
        }
    }
}

/// Drives a strategy against a tick stream through an `OrderSink`.
///
/// Each tick is processed to completion: stop checks, aggregation, and when
/// the tick finalized at least one bar, one strategy evaluation on the
/// newest bar followed by at most one order.
pub struct LiveDispatcher<S: OrderSink> {
    config: DispatchConfig,
    sink: S,
    strategy: Box<dyn StrategySignalSource>,
    aggregator: BarAggregator,
    bars: Vec<Bar>,
    position: Position,
    units_held: i64,
    profit: f64,
    fills: Vec<OrderFill>,
    state: DispatchState,
}

impl<S: OrderSink> LiveDispatcher<S> {
    pub fn new(
        config: DispatchConfig,
        sink: S,
        strategy: Box<dyn StrategySignalSource>,
        aggregator: BarAggregator,
        history: Vec<Bar>,
    ) -> Result<Self, LiveError> {
        if config.units <= 0 {
            return Err(LiveError::InvalidConfig(format!(
                "units must be positive, got {}",
                config.units
            )));
        }
        if config.max_bars == 0 {
            return Err(LiveError::InvalidConfig("max_bars must be >= 1".into()));
        }
        if !config.stops.is_consistent() {
            return Err(LiveError::InvalidConfig(
                "stop_loss must be below stop_profit".into(),
            ));
        }
        let mut dispatcher = Self {
            config,
            sink,
            strategy,
            aggregator,
            bars: history,
            position: Position::Neutral,
            units_held: 0,
            profit: 0.0,
            fills: Vec::new(),
            state: DispatchState::Running,
        };
        dispatcher.trim_window();
        Ok(dispatcher)
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn units_held(&self) -> i64 {
        self.units_held
    }

    /// Cumulative realized P/L reported by the broker.
    pub fn profit(&self) -> f64 {
        self.profit
    }

    pub fn fills(&self) -> &[OrderFill] {
        &self.fills
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn aggregation_report(&self) -> &AggregationReport {
        self.aggregator.report()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Process one tick.
    ///
    /// Invalid ticks are rejected before anything else sees them: they
    /// never reach the broker, trigger a stop or change state. The error is
    /// returned so the caller can decide to drop the tick or abort. Broker
    /// errors stop the dispatcher after a best-effort close.
    pub fn on_tick(&mut self, tick: Tick) -> Result<DispatchState, LiveError> {
        if self.state.is_stopped() {
            return Ok(self.state);
        }
        self.aggregator.screen(&tick)?;
        self.sink.observe_tick(&tick);

        if let Some(reason) = self.config.stops.check(tick.timestamp, self.profit) {
            warn!(?reason, profit = self.profit, at = %tick.timestamp, "stop condition triggered");
            self.close_position(reason)?;
            return Ok(self.state);
        }

        let finalized = self.aggregator.ingest(tick)?;
        if finalized.is_empty() {
            return Ok(self.state);
        }
        self.bars.extend(finalized);
        self.trim_window();

        match self.strategy.latest_signal(&self.bars) {
            Ok(Some(target)) => self.trade(target)?,
            Ok(None) => {}
            Err(StrategyError::WarmupIncomplete { required, available }) => {
                debug!(required, available, "strategy warming up");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(self.state)
    }

    /// Move to `target` with a single order.
    ///
    /// The order is `target * units - units_held`, so flips trade twice the
    /// position size and going neutral trades exactly the open units.
    fn trade(&mut self, target: Position) -> Result<(), LiveError> {
        if target == self.position {
            return Ok(());
        }
        let units = target.signum() * self.config.units - self.units_held;
        if units == 0 {
            self.position = target;
            return Ok(());
        }
        match self.submit(units) {
            Ok(()) => {
                self.position = target;
                Ok(())
            }
            Err(err) => {
                error!(%err, units, "order failed, closing out");
                if let Err(close_err) = self.flatten() {
                    error!(%close_err, "best-effort close failed");
                }
                self.state = DispatchState::Stopped(StopReason::BrokerFailure);
                Err(err.into())
            }
        }
    }

    /// Flatten the position and stop. Idempotent once flat.
    pub fn close_position(&mut self, reason: StopReason) -> Result<(), LiveError> {
        if !self.state.is_stopped() {
            self.state = DispatchState::Stopped(reason);
        }
        self.flatten()?;
        info!(
            reason = ?reason,
            profit = self.profit,
            orders = self.fills.len(),
            "live position closed"
        );
        Ok(())
    }

    fn flatten(&mut self) -> Result<(), BrokerError> {
        if self.units_held != 0 {
            self.submit(-self.units_held)?;
        }
        self.position = Position::Neutral;
        Ok(())
    }

    fn submit(&mut self, units: i64) -> Result<(), BrokerError> {
        let fill = self.sink.create_order(&self.config.instrument, units)?;
        self.units_held += fill.units;
        self.profit += fill.realized_pnl;
        info!(
            time = %fill.fill_time,
            units = fill.units,
            price = fill.fill_price,
            pnl = fill.realized_pnl,
            cum_pnl = self.profit,
            "order filled"
        );
        self.fills.push(fill);
        Ok(())
    }

    fn trim_window(&mut self) {
        if self.bars.len() > self.config.max_bars {
            let excess = self.bars.len() - self.config.max_bars;
            self.bars.drain(..excess);
        }
    }
}
