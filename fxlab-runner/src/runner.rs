//! Run orchestration: config in, loaded bars through an engine, report out.
//!
//! Entry points used by the CLI:
//! - `run_backtest()`: iterative, ledger-based simulation.
//! - `run_vectorized_backtest()`: log-return backtest with trading costs.
//! - `run_optimization()`: parameter sweep over `[sweep]`.
//!
//! The `*_on` variants take pre-loaded bars.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use fxlab_core::engine::{simulate, SimulationError, SimulationReport};
use fxlab_core::fingerprint::RunId;
use fxlab_core::strategy::StrategyError;

use crate::config::{ConfigError, FxLabConfig};
use crate::data_loader::{load_bars, LoadError, LoadedBars};
use crate::sweep::{run_sweep, SweepContext, SweepError, SweepResults};
use crate::vectorized::{run_vectorized, VectorizedError, VectorizedReport};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Vectorized(#[from] VectorizedError),
    #[error(transparent)]
    Sweep(#[from] SweepError),
    #[error("fingerprint failed: {0}")]
    Fingerprint(#[from] serde_json::Error),
    #[error("config has no [sweep] section")]
    MissingSweep,
}

/// Report plus the identity of the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome<R> {
    pub run_id: RunId,
    pub source: String,
    pub synthetic: bool,
    pub report: R,
}

pub fn run_backtest(config: &FxLabConfig) -> Result<RunOutcome<SimulationReport>, RunError> {
    let loaded = load_bars(&config.backtest)?;
    run_backtest_on(config, &loaded)
}

pub fn run_backtest_on(
    config: &FxLabConfig,
    loaded: &LoadedBars,
) -> Result<RunOutcome<SimulationReport>, RunError> {
    let strategy = config.strategy.build(config.backtest.price_field)?;
    let report = simulate(&loaded.bars, strategy.as_ref(), &config.simulation_config())?;
    info!(
        strategy = %report.strategy,
        performance = report.performance,
        out_performance = report.out_performance,
        trades = report.trade_count,
        "backtest finished"
    );
    outcome(config, loaded, report)
}

pub fn run_vectorized_backtest(
    config: &FxLabConfig,
) -> Result<RunOutcome<VectorizedReport>, RunError> {
    let loaded = load_bars(&config.backtest)?;
    run_vectorized_on(config, &loaded)
}

pub fn run_vectorized_on(
    config: &FxLabConfig,
    loaded: &LoadedBars,
) -> Result<RunOutcome<VectorizedReport>, RunError> {
    let strategy = config.strategy.build(config.backtest.price_field)?;
    let report = run_vectorized(
        &loaded.bars,
        strategy.as_ref(),
        config.backtest.price_field,
        config.backtest.trading_cost,
    )?;
    info!(
        strategy = %report.strategy,
        performance = report.performance,
        out_performance = report.out_performance,
        trades = report.trades,
        "vectorized backtest finished"
    );
    outcome(config, loaded, report)
}

pub fn run_optimization(config: &FxLabConfig) -> Result<RunOutcome<SweepResults>, RunError> {
    let loaded = load_bars(&config.backtest)?;
    run_optimization_on(config, &loaded)
}

pub fn run_optimization_on(
    config: &FxLabConfig,
    loaded: &LoadedBars,
) -> Result<RunOutcome<SweepResults>, RunError> {
    let sweep = config.sweep.as_ref().ok_or(RunError::MissingSweep)?;
    let ctx = SweepContext {
        engine: sweep.engine,
        price_field: config.backtest.price_field,
        trading_cost: config.backtest.trading_cost,
        simulation: config.simulation_config(),
    };
    let mut results = run_sweep(&loaded.bars, &config.strategy, &sweep.ranges, &ctx)?;
    results.trials.truncate(sweep.top);
    if let Some(best) = results.best() {
        info!(
            best = %best.id.short(),
            performance = best.performance,
            candidates = results.candidates,
            "optimization finished"
        );
    }
    outcome(config, loaded, results)
}

fn outcome<R>(
    config: &FxLabConfig,
    loaded: &LoadedBars,
    report: R,
) -> Result<RunOutcome<R>, RunError> {
    Ok(RunOutcome {
        run_id: RunId::new(&config.strategy, &loaded.bars)?,
        source: loaded.source.clone(),
        synthetic: loaded.synthetic,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [backtest]
        instrument = "EUR_USD"
        granularity = "H1"
        initial_balance = 10000.0
        trading_cost = 0.00007

        [strategy]
        type = "sma_cross"
        short = 5
        long = 20
    "#;

    #[test]
    fn backtest_on_synthetic_bars_is_deterministic() {
        let config = FxLabConfig::from_toml_str(CONFIG).unwrap();
        let a = run_backtest(&config).unwrap();
        let b = run_backtest(&config).unwrap();
        assert!(a.synthetic);
        assert_eq!(a.run_id, b.run_id);
        assert_eq!(a.report, b.report);
        assert!(a.report.final_balance > 0.0);
    }

    #[test]
    fn optimization_requires_a_sweep_section() {
        let config = FxLabConfig::from_toml_str(CONFIG).unwrap();
        assert!(matches!(
            run_optimization(&config),
            Err(RunError::MissingSweep)
        ));
    }

    #[test]
    fn vectorized_run_shares_the_run_id_of_the_iterative_run() {
        let config = FxLabConfig::from_toml_str(CONFIG).unwrap();
        let loaded = load_bars(&config.backtest).unwrap();
        let iterative = run_backtest_on(&config, &loaded).unwrap();
        let vectorized = run_vectorized_on(&config, &loaded).unwrap();
        assert_eq!(iterative.run_id, vectorized.run_id);
        assert_eq!(vectorized.report.trading_cost, 0.00007);
    }
}
