//! TOML run configuration.
//!
//! One file describes a backtest and, optionally, a live/replay session and
//! an optimization sweep:
//!
//! ```toml
//! [backtest]
//! instrument = "EUR_USD"
//! granularity = "M5"
//! initial_balance = 10000.0
//!
//! [strategy]
//! type = "sma_cross"
//! short = 50
//! long = 200
//!
//! [sweep.ranges]
//! short = { start = 10, end = 60, step = 10 }
//! ```
//!
//! Everything is validated up front by [`FxLabConfig::validate`], before
//! any data is loaded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fxlab_core::domain::{parse_bar_length, Granularity, GranularityError, PriceField};
use fxlab_core::engine::SimulationConfig;
use fxlab_core::ledger::OrderSize;
use fxlab_core::live::{DispatchConfig, LiveConfig, StopConditions, DEFAULT_MAX_BARS};
use fxlab_core::strategy::{StrategyError, StrategyParams};

use crate::sweep::{Engine, ParamRange};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Granularity(#[from] GranularityError),
}

fn default_true() -> bool {
    true
}

fn default_order_size() -> OrderSize {
    OrderSize::All
}

fn default_granularity() -> Granularity {
    Granularity::D
}

/// `[backtest]`: instrument, data and ledger settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub instrument: String,
    #[serde(default = "default_granularity")]
    pub granularity: Granularity,
    /// Inclusive start of the history window.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    pub initial_balance: f64,
    #[serde(default = "default_true")]
    pub use_spread: bool,
    #[serde(default = "default_order_size")]
    pub order_size: OrderSize,
    /// Proportional cost per unit of position change (vectorized engine).
    #[serde(default)]
    pub trading_cost: f64,
    #[serde(default)]
    pub price_field: PriceField,
    /// Quotes CSV; when absent the synthetic source is used.
    #[serde(default)]
    pub data: Option<PathBuf>,
}

/// `[live]`: dispatch parameters for live trading and tick replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSection {
    pub units: i64,
    pub bar_length: String,
    #[serde(default)]
    pub stop_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub stop_profit: Option<f64>,
    #[serde(default)]
    pub max_bars: Option<usize>,
    #[serde(default)]
    pub history_granularity: Option<Granularity>,
    #[serde(default)]
    pub ignore_market_hours: bool,
}

impl LiveSection {
    pub fn bar_length(&self) -> Result<Duration, ConfigError> {
        Ok(parse_bar_length(&self.bar_length)?)
    }

    pub fn stops(&self) -> StopConditions {
        StopConditions {
            stop_datetime: self.stop_datetime,
            stop_loss: self.stop_loss,
            stop_profit: self.stop_profit,
        }
    }

    pub fn dispatch_config(&self, instrument: &str) -> DispatchConfig {
        let mut config = DispatchConfig::new(instrument, self.units);
        config.stops = self.stops();
        config.max_bars = self.max_bars.unwrap_or(DEFAULT_MAX_BARS);
        config
    }

    /// Session settings for `LiveSession::open`.
    pub fn live_config(&self, instrument: &str) -> Result<LiveConfig, ConfigError> {
        let mut config = LiveConfig::new(self.dispatch_config(instrument), self.bar_length()?);
        if let Some(g) = self.history_granularity {
            config.history_granularity = g;
        }
        config.ignore_market_hours = self.ignore_market_hours;
        Ok(config)
    }
}

fn default_top() -> usize {
    10
}

/// `[sweep]`: parameter ranges over the `[strategy]` family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSection {
    #[serde(default)]
    pub engine: Engine,
    /// Number of ranked trials to keep in reports.
    #[serde(default = "default_top")]
    pub top: usize,
    pub ranges: BTreeMap<String, ParamRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxLabConfig {
    pub backtest: BacktestSection,
    pub strategy: StrategyParams,
    #[serde(default)]
    pub live: Option<LiveSection>,
    #[serde(default)]
    pub sweep: Option<SweepSection>,
}

impl FxLabConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.backtest;
        if b.instrument.trim().is_empty() {
            return Err(ConfigError::Invalid("backtest.instrument is empty".into()));
        }
        if !b.initial_balance.is_finite() || b.initial_balance <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "backtest.initial_balance must be positive, got {}",
                b.initial_balance
            )));
        }
        if !b.trading_cost.is_finite() || b.trading_cost < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "backtest.trading_cost must be >= 0, got {}",
                b.trading_cost
            )));
        }
        if let (Some(start), Some(end)) = (b.start, b.end) {
            if start >= end {
                return Err(ConfigError::Invalid(format!(
                    "backtest.start {start} must precede backtest.end {end}"
                )));
            }
        }
        match b.order_size {
            OrderSize::Units(n) if n <= 0 => {
                return Err(ConfigError::Invalid(format!(
                    "backtest.order_size units must be positive, got {n}"
                )));
            }
            OrderSize::Amount(a) if !a.is_finite() || a <= 0.0 => {
                return Err(ConfigError::Invalid(format!(
                    "backtest.order_size amount must be positive, got {a}"
                )));
            }
            _ => {}
        }

        self.strategy.validate()?;

        if let Some(live) = &self.live {
            if live.units <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "live.units must be positive, got {}",
                    live.units
                )));
            }
            let bar_length = live.bar_length()?;
            if let Some(g) = live.history_granularity {
                if g.duration() >= bar_length {
                    return Err(ConfigError::Invalid(format!(
                        "live.history_granularity {g} must be finer than bar_length {}",
                        live.bar_length
                    )));
                }
            }
            if live.max_bars == Some(0) {
                return Err(ConfigError::Invalid("live.max_bars must be >= 1".into()));
            }
            if !live.stops().is_consistent() {
                return Err(ConfigError::Invalid(
                    "live.stop_loss must be below live.stop_profit".into(),
                ));
            }
        }

        if let Some(sweep) = &self.sweep {
            if sweep.ranges.is_empty() {
                return Err(ConfigError::Invalid("sweep.ranges is empty".into()));
            }
            for (name, range) in &sweep.ranges {
                range
                    .values()
                    .map_err(|reason| StrategyError::InvalidParameterRange {
                        strategy: self.strategy.family(),
                        reason: format!("{name}: {reason}"),
                    })?;
            }
        }
        Ok(())
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            initial_balance: self.backtest.initial_balance,
            use_spread: self.backtest.use_spread,
            order_size: self.backtest.order_size,
        }
    }
}

/// Read, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<FxLabConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FxLabConfig::from_toml_str(&content)
}
