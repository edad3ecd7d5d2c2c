//! Tick replay: the live dispatch loop driven by recorded ticks and the
//! paper broker.
//!
//! The first `warmup_ticks` ticks play the role of the history backfill: they
//! are resampled into bars and seed the aggregator. The rest is streamed
//! through a `LiveSession`, which closes the position when the ticks run out.

use chrono::Duration;
use tracing::info;

use fxlab_core::aggregator::BarAggregator;
use fxlab_core::domain::Tick;
use fxlab_core::live::{DispatchConfig, LiveDispatcher, LiveError, LiveSession, SessionSummary};
use fxlab_core::strategy::StrategySignalSource;

use crate::paper::PaperBroker;

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub dispatch: DispatchConfig,
    pub bar_length: Duration,
    /// Leading ticks used as history; 0 starts from an empty bar window.
    pub warmup_ticks: usize,
}

pub fn replay_ticks(
    ticks: &[Tick],
    strategy: Box<dyn StrategySignalSource>,
    config: ReplayConfig,
) -> Result<SessionSummary, LiveError> {
    let split = config.warmup_ticks.min(ticks.len());
    let (history_ticks, stream) = ticks.split_at(split);

    let (aggregator, history) = if history_ticks.is_empty() {
        (BarAggregator::new(config.bar_length)?, Vec::new())
    } else {
        BarAggregator::from_history(config.bar_length, history_ticks)?
    };
    info!(
        history_bars = history.len(),
        stream_ticks = stream.len(),
        "replay starting"
    );

    let dispatcher = LiveDispatcher::new(
        config.dispatch,
        PaperBroker::new(),
        strategy,
        aggregator,
        history,
    )?;
    let mut session = LiveSession::from_dispatcher(dispatcher);
    session.run(stream.iter().copied())
}
