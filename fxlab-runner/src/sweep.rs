//! Parameter sweeps: grid search over one strategy family.
//!
//! Ranges are applied on top of a base parameter set: each named field is
//! replaced by every value of its range, the cartesian product is built, and
//! candidates the family rejects (e.g. `short >= long`) are skipped. Trials
//! run in parallel with rayon and are ranked by performance. A trial that
//! fails (warm-up longer than the data, insufficient balance) is recorded
//! with its error and does not abort the sweep.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use fxlab_core::domain::{Bar, PriceField};
use fxlab_core::engine::{IterativeSimulator, SimulationConfig, SimulationError};
use fxlab_core::fingerprint::ParamsHash;
use fxlab_core::strategy::{StrategyError, StrategyParams};

use crate::vectorized::{run_vectorized, VectorizedError};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("{family} has no parameter '{param}'")]
    UnknownParameter { family: &'static str, param: String },

    #[error("no valid parameter combination in the sweep grid")]
    EmptyGrid,

    #[error("all {failed} sweep trials failed, first: {first}")]
    AllTrialsFailed { failed: usize, first: String },

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Vectorized(#[from] VectorizedError),

    #[error("cannot fingerprint parameters: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Upper bound on the number of values in one range.
pub const MAX_RANGE_VALUES: usize = 10_000;

/// Half-open range `[start, end)` walked in `step` increments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl ParamRange {
    pub fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    /// All values of the range; inverted, empty, non-finite or oversized
    /// ranges are errors.
    pub fn values(&self) -> Result<Vec<f64>, String> {
        let Self { start, end, step } = *self;
        if !(start.is_finite() && end.is_finite() && step.is_finite()) {
            return Err("range bounds must be finite".into());
        }
        if step <= 0.0 {
            return Err(format!("step must be positive, got {step}"));
        }
        if start >= end {
            return Err(format!("start {start} must be below end {end}"));
        }
        let steps = ((end - start) / step).ceil();
        if steps > MAX_RANGE_VALUES as f64 {
            return Err(format!(
                "{steps} values exceed the limit of {MAX_RANGE_VALUES} per range"
            ));
        }
        let count = steps as usize;
        Ok((0..count)
            .map(|i| start + i as f64 * step)
            .filter(|v| *v < end)
            .collect())
    }
}

/// Which backtest evaluates each trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    #[default]
    Vectorized,
    Iterative,
}

/// Shared inputs of every trial.
#[derive(Debug, Clone)]
pub struct SweepContext {
    pub engine: Engine,
    pub price_field: PriceField,
    /// Vectorized engine only.
    pub trading_cost: f64,
    /// Iterative engine only.
    pub simulation: SimulationConfig,
}

/// One evaluated parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: ParamsHash,
    pub params: StrategyParams,
    /// Multiplier over the run; 1.0 is break-even.
    pub performance: f64,
    pub out_performance: f64,
    pub trades: usize,
}

/// A candidate whose evaluation returned an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTrial {
    pub id: ParamsHash,
    pub params: StrategyParams,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    pub engine: Engine,
    pub family: String,
    pub candidates: usize,
    pub skipped: usize,
    /// Best first.
    pub trials: Vec<Trial>,
    /// Ordered by parameter hash.
    #[serde(default)]
    pub failed: Vec<FailedTrial>,
}

impl SweepResults {
    pub fn best(&self) -> Option<&Trial> {
        self.trials.first()
    }

    pub fn top(&self, n: usize) -> &[Trial] {
        &self.trials[..n.min(self.trials.len())]
    }
}

/// Expand `ranges` over `base` into concrete parameter sets.
///
/// Returns the valid candidates and the number of skipped combinations.
pub fn expand_grid(
    base: &StrategyParams,
    ranges: &BTreeMap<String, ParamRange>,
) -> Result<(Vec<StrategyParams>, usize), SweepError> {
    let family = base.family();
    let Value::Object(base_fields) = serde_json::to_value(base)? else {
        return Err(SweepError::UnknownParameter {
            family,
            param: "type".into(),
        });
    };

    let mut axes: Vec<(&str, bool, Vec<f64>)> = Vec::with_capacity(ranges.len());
    for (name, range) in ranges {
        let current = base_fields
            .get(name)
            .filter(|_| name != "type")
            .ok_or_else(|| SweepError::UnknownParameter {
                family,
                param: name.clone(),
            })?;
        let values = range
            .values()
            .map_err(|reason| StrategyError::InvalidParameterRange {
                strategy: family,
                reason: format!("{name}: {reason}"),
            })?;
        axes.push((name.as_str(), current.is_u64(), values));
    }

    let mut grid = vec![base_fields];
    for (name, integer, values) in &axes {
        let mut next = Vec::with_capacity(grid.len() * values.len());
        for fields in &grid {
            for v in values {
                let mut fields = fields.clone();
                let value = if *integer {
                    Value::Number(Number::from(v.round().max(0.0) as u64))
                } else {
                    Number::from_f64(*v).map(Value::Number).unwrap_or(Value::Null)
                };
                fields.insert((*name).to_string(), value);
                next.push(fields);
            }
        }
        grid = next;
    }

    let mut candidates = Vec::with_capacity(grid.len());
    let mut skipped = 0;
    for fields in grid {
        let params: StrategyParams = serde_json::from_value(Value::Object(fields))?;
        match params.validate() {
            Ok(()) => candidates.push(params),
            Err(err) => {
                debug!(%err, "skipping candidate");
                skipped += 1;
            }
        }
    }
    Ok((candidates, skipped))
}

fn evaluate(
    bars: &[Bar],
    params: &StrategyParams,
    ctx: &SweepContext,
) -> Result<Trial, SweepError> {
    let strategy = params.build(ctx.price_field)?;
    let (performance, out_performance, trades) = match ctx.engine {
        Engine::Vectorized => {
            let report =
                run_vectorized(bars, strategy.as_ref(), ctx.price_field, ctx.trading_cost)?;
            (report.performance, report.out_performance, report.trades)
        }
        Engine::Iterative => {
            let mut simulator = IterativeSimulator::new(ctx.simulation.clone())?;
            let report = simulator.run(bars, strategy.as_ref())?;
            (report.performance, report.out_performance, report.trade_count)
        }
    };
    Ok(Trial {
        id: ParamsHash::of(params)?,
        params: params.clone(),
        performance,
        out_performance,
        trades,
    })
}

/// Evaluate every candidate of the grid and rank them, best first.
///
/// Ties are broken by parameter hash so the ranking is deterministic.
pub fn run_sweep(
    bars: &[Bar],
    base: &StrategyParams,
    ranges: &BTreeMap<String, ParamRange>,
    ctx: &SweepContext,
) -> Result<SweepResults, SweepError> {
    let span = info_span!("sweep", family = base.family(), engine = ?ctx.engine);
    let _guard = span.enter();

    let (candidates, skipped) = expand_grid(base, ranges)?;
    if candidates.is_empty() {
        return Err(SweepError::EmptyGrid);
    }
    info!(candidates = candidates.len(), skipped, "sweep started");

    let outcomes: Vec<_> = candidates
        .par_iter()
        .map(|params| (params, evaluate(bars, params, ctx)))
        .collect();

    let mut trials = Vec::with_capacity(outcomes.len());
    let mut failed = Vec::new();
    for (params, outcome) in outcomes {
        match outcome {
            Ok(trial) => trials.push(trial),
            Err(err) => {
                warn!(%err, params = ?params, "trial failed");
                failed.push(FailedTrial {
                    id: ParamsHash::of(params)?,
                    params: params.clone(),
                    error: err.to_string(),
                });
            }
        }
    }
    failed.sort_by(|a, b| a.id.cmp(&b.id));
    if trials.is_empty() {
        return Err(SweepError::AllTrialsFailed {
            failed: failed.len(),
            first: failed.first().map(|f| f.error.clone()).unwrap_or_default(),
        });
    }

    trials.sort_by(|a, b| {
        b.performance
            .total_cmp(&a.performance)
            .then_with(|| a.id.cmp(&b.id))
    });

    if let Some(best) = trials.first() {
        info!(
            best = %best.id.short(),
            performance = best.performance,
            out_performance = best.out_performance,
            failed = failed.len(),
            "sweep finished"
        );
    }

    Ok(SweepResults {
        engine: ctx.engine,
        family: base.family().to_string(),
        candidates: candidates.len(),
        skipped,
        trials,
        failed,
    })
}
