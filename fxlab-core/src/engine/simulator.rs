//! Iterative bar-by-bar simulator.
//!
//! For every bar except the last, the strategy's target position is compared
//! with the current one and the ledger executes a single order when they
//! differ. The last bar is reserved for the terminal `close_position`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span};

use crate::domain::{validate_bars, Bar, BarError, Position};
use crate::ledger::{ExecutionEntry, LedgerError, OrderSize, PositionLedger};
use crate::strategy::StrategySignalSource;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("need at least {required} bars, got {available}")]
    NotEnoughBars { required: usize, available: usize },

    #[error("ledger failure at bar {bar_index}: {source}")]
    Ledger {
        bar_index: usize,
        #[source]
        source: LedgerError,
    },

    #[error("invalid simulation config: {0}")]
    Config(LedgerError),

    #[error(transparent)]
    Data(#[from] BarError),
}

/// Configuration for a single simulated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_balance: f64,
    #[serde(default = "default_use_spread")]
    pub use_spread: bool,
    /// Size of every entry order. Flips add the units needed to cover.
    #[serde(default = "default_order_size")]
    pub order_size: OrderSize,
}

fn default_use_spread() -> bool {
    true
}

fn default_order_size() -> OrderSize {
    OrderSize::All
}

impl SimulationConfig {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            use_spread: default_use_spread(),
            order_size: default_order_size(),
        }
    }

    pub fn without_spread(mut self) -> Self {
        self.use_spread = false;
        self
    }
}

/// A change of simulated position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub from: Position,
    pub to: Position,
}

impl Transition {
    /// Long to short or short to long in one step.
    pub fn is_flip(&self) -> bool {
        !self.from.is_flat() && self.to == self.from.opposite()
    }
}

/// Result of one simulated run. Multipliers are 1.0 at break-even.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub strategy: String,
    pub bars: usize,
    pub initial_balance: f64,
    pub final_balance: f64,
    /// `final_balance / initial_balance`.
    pub performance: f64,
    pub performance_pct: f64,
    pub trade_count: usize,
    /// Bid-price multiplier over the same bars.
    pub buy_and_hold: f64,
    pub out_performance: f64,
    pub transitions: Vec<Transition>,
    pub executions: Vec<ExecutionEntry>,
}

impl SimulationReport {
    pub fn flip_count(&self) -> usize {
        self.transitions.iter().filter(|t| t.is_flip()).count()
    }
}

/// Replays bars through a strategy and a position ledger.
///
/// The ledger is reset at the start of every run, so one simulator can be
/// reused for independent runs without carryover.
#[derive(Debug, Clone)]
pub struct IterativeSimulator {
    config: SimulationConfig,
    ledger: PositionLedger,
}

impl IterativeSimulator {
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let ledger = PositionLedger::new(config.initial_balance, config.use_spread)
            .map_err(SimulationError::Config)?;
        Ok(Self { config, ledger })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Ledger as left by the last run.
    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn run(
        &mut self,
        bars: &[Bar],
        strategy: &dyn StrategySignalSource,
    ) -> Result<SimulationReport, SimulationError> {
        let span = info_span!("simulation", strategy = strategy.name(), bars = bars.len());
        let _guard = span.enter();

        if bars.len() < 2 {
            return Err(SimulationError::NotEnoughBars {
                required: 2,
                available: bars.len(),
            });
        }
        validate_bars(bars)?;
        self.ledger.reset();

        let signals = strategy.signals(bars);
        let last = bars.len() - 1;
        let mut state = Position::Neutral;
        let mut transitions = Vec::new();

        for (bar_index, (bar, signal)) in bars[..last].iter().zip(&signals).enumerate() {
            let Some(target) = *signal else {
                continue;
            };
            if target == state {
                continue;
            }

            self.transition(bar, target)
                .map_err(|source| SimulationError::Ledger { bar_index, source })?;
            debug!(bar_index, from = ?state, to = ?target, "transition");
            transitions.push(Transition {
                bar_index,
                timestamp: bar.timestamp,
                from: state,
                to: target,
            });
            state = target;
        }

        let performance_fraction = self.ledger.close_position(&bars[last]);

        let initial_balance = self.ledger.initial_balance();
        let final_balance = self.ledger.cash_balance();
        let performance = 1.0 + performance_fraction;
        let buy_and_hold = bars[last].bid_price / bars[0].bid_price;

        let report = SimulationReport {
            strategy: strategy.name().to_string(),
            bars: bars.len(),
            initial_balance,
            final_balance,
            performance,
            performance_pct: performance_fraction * 100.0,
            trade_count: self.ledger.trade_count(),
            buy_and_hold,
            out_performance: performance - buy_and_hold,
            transitions,
            executions: self.ledger.executions().to_vec(),
        };
        info!(
            final_balance = report.final_balance,
            performance = report.performance,
            out_performance = report.out_performance,
            trades = report.trade_count,
            "simulation finished"
        );
        Ok(report)
    }

    fn transition(&mut self, bar: &Bar, target: Position) -> Result<(), LedgerError> {
        match target {
            Position::Long => self.ledger.go_long(bar, self.config.order_size).map(|_| ()),
            Position::Short => self.ledger.go_short(bar, self.config.order_size).map(|_| ()),
            Position::Neutral => self.ledger.go_neutral(bar),
        }
    }
}

/// One-shot run with a fresh simulator.
pub fn simulate(
    bars: &[Bar],
    strategy: &dyn StrategySignalSource,
    config: &SimulationConfig,
) -> Result<SimulationReport, SimulationError> {
    IterativeSimulator::new(config.clone())?.run(bars, strategy)
}
