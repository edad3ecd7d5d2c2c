//! FxLab Runner — backtest orchestration on top of `fxlab-core`.
//!
//! This crate provides:
//! - TOML run configuration with up-front validation
//! - Bar loading from CSV quote files or a seeded synthetic walk
//! - Vectorized log-return backtests with trading costs
//! - Parallel parameter sweeps ranked by performance
//! - Paper broker and tick replay through the live dispatcher
//! - Trading-cost coverage by hour of day
//! - JSON result artifacts

pub mod artifact;
pub mod config;
pub mod costs;
pub mod data_loader;
pub mod paper;
pub mod replay;
pub mod runner;
pub mod sweep;
pub mod vectorized;

pub use artifact::{read_artifact, write_artifact, Artifact, SCHEMA_VERSION};
pub use config::{load_config, ConfigError, FxLabConfig};
pub use costs::{cost_coverage, CostCoverage, HourCoverage};
pub use data_loader::{load_bars, LoadError, LoadedBars, SyntheticSource};
pub use paper::PaperBroker;
pub use replay::{replay_ticks, ReplayConfig};
pub use runner::{
    run_backtest, run_optimization, run_vectorized_backtest, RunError, RunOutcome,
};
pub use sweep::{run_sweep, Engine, FailedTrial, ParamRange, SweepResults, Trial};
pub use vectorized::{run_vectorized, VectorizedReport};
