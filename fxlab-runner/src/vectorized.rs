//! Vectorized backtest: log-return arithmetic over a whole bar table.
//!
//! The position decided on bar `t` earns the log return of bar `t + 1`.
//! Every change of position costs `|Δposition| × trading_cost` in log-return
//! space, so a flip costs twice as much as an entry. No cash or units are
//! tracked; see the iterative simulator for that.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use fxlab_core::domain::{validate_bars, Bar, BarError, Position, PriceField};
use fxlab_core::indicators::{Indicator, LogReturns};
use fxlab_core::strategy::StrategySignalSource;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VectorizedError {
    #[error("no bar has both a held position and a return ({bars} bars, warm-up {warmup})")]
    NotEnoughBars { bars: usize, warmup: usize },

    #[error("trading cost must be finite and >= 0, got {0}")]
    InvalidTradingCost(f64),

    #[error(transparent)]
    Data(#[from] BarError),
}

/// One evaluated bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorizedRow {
    pub bar_index: usize,
    pub position: Position,
    /// Log return of the price series over this bar.
    pub market_return: f64,
    /// Previous bar's position times `market_return`, net of costs.
    pub strategy_return: f64,
    /// Absolute position change on this bar (0, 1 or 2).
    pub trades: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizedReport {
    pub strategy: String,
    pub trading_cost: f64,
    /// `exp(Σ strategy_return)`; 1.0 is break-even.
    pub performance: f64,
    /// `exp(Σ market_return)` over the same rows.
    pub buy_and_hold: f64,
    pub out_performance: f64,
    /// Sum of absolute position changes.
    pub trades: usize,
    pub rows: Vec<VectorizedRow>,
}

/// Positions with `None` ("hold") carried forward; leading `None`s stay
/// undecided.
fn held_positions(signals: &[Option<Position>]) -> Vec<Option<Position>> {
    let mut held = None;
    signals
        .iter()
        .map(|signal| {
            if signal.is_some() {
                held = *signal;
            }
            held
        })
        .collect()
}

pub fn run_vectorized(
    bars: &[Bar],
    strategy: &dyn StrategySignalSource,
    price_field: PriceField,
    trading_cost: f64,
) -> Result<VectorizedReport, VectorizedError> {
    if !trading_cost.is_finite() || trading_cost < 0.0 {
        return Err(VectorizedError::InvalidTradingCost(trading_cost));
    }
    validate_bars(bars)?;

    let prices: Vec<f64> = bars.iter().map(|b| b.price(price_field)).collect();
    let returns = LogReturns.compute(&prices);
    let positions = held_positions(&strategy.signals(bars));

    let mut rows: Vec<VectorizedRow> = Vec::new();
    for t in 1..bars.len() {
        let (Some(prev), Some(position)) = (positions[t - 1], positions[t]) else {
            continue;
        };
        if !returns[t].is_finite() {
            continue;
        }
        // The first kept row has no predecessor to trade against.
        let trades = rows
            .last()
            .map_or(0, |last| (position.signum() - last.position.signum()).unsigned_abs() as u32);
        let strategy_return =
            prev.signum() as f64 * returns[t] - f64::from(trades) * trading_cost;
        rows.push(VectorizedRow {
            bar_index: t,
            position,
            market_return: returns[t],
            strategy_return,
            trades,
        });
    }

    if rows.is_empty() {
        return Err(VectorizedError::NotEnoughBars {
            bars: bars.len(),
            warmup: strategy.warmup_bars(),
        });
    }

    let performance = rows.iter().map(|r| r.strategy_return).sum::<f64>().exp();
    let buy_and_hold = rows.iter().map(|r| r.market_return).sum::<f64>().exp();
    let trades = rows.iter().map(|r| r.trades as usize).sum();

    let report = VectorizedReport {
        strategy: strategy.name().to_string(),
        trading_cost,
        performance,
        buy_and_hold,
        out_performance: performance - buy_and_hold,
        trades,
        rows,
    };
    info!(
        strategy = %report.strategy,
        performance = report.performance,
        out_performance = report.out_performance,
        trades = report.trades,
        "vectorized backtest finished"
    );
    Ok(report)
}
