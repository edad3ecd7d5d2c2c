//! Integration tests for the live dispatcher and session.
//!
//! Tests:
//! 1. Stop-loss triggers on cumulative broker P/L, checked at tick start
//! 2. A flip is a single order of twice the position size
//! 3. A broker failure stops trading after a best-effort close
//! 4. Stop datetime flattens and stops; invalid ticks cannot trigger it
//! 5. Sessions close the position when the stream ends
//! 6. Session opening: market hours, stale history retry, seeded start

use std::cell::Cell;
use std::collections::VecDeque;

use chrono::{DateTime, Duration, TimeZone, Utc};

use fxlab_core::aggregator::BarAggregator;
use fxlab_core::data::{DataError, HistoryRequest, MarketDataSource, PricePoint, PriceSide};
use fxlab_core::domain::{Bar, OrderFill, Position, Tick};
use fxlab_core::live::{
    BrokerError, Clock, DispatchConfig, DispatchState, LiveConfig, LiveDispatcher, LiveError,
    LiveSession, OrderSink, StopConditions, StopReason,
};
use fxlab_core::strategy::StrategySignalSource;

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// Tuesday 2023-11-14 22:14:00 UTC, on a minute boundary.
fn base() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_040, 0).unwrap()
}

fn tick(secs: i64, bid: f64) -> Tick {
    Tick::new(base() + Duration::seconds(secs), bid, bid + 0.0002)
}

/// Long above 1.5, short below, neutral at exactly 1.5.
struct Threshold;

impl StrategySignalSource for Threshold {
    fn name(&self) -> &str {
        "threshold"
    }

    fn warmup_bars(&self) -> usize {
        1
    }

    fn signals(&self, bars: &[Bar]) -> Vec<Option<Position>> {
        bars.iter()
            .map(|b| Some(Position::from_sign(b.bid_price - 1.5)))
            .collect()
    }
}

/// Broker double: fills every order at the last seen bid with scripted P/L.
#[derive(Default)]
struct ScriptedSink {
    pnl: VecDeque<f64>,
    attempts: Vec<i64>,
    fail_on: Option<usize>,
    last: Option<Tick>,
}

impl ScriptedSink {
    fn with_pnl(pnl: &[f64]) -> Self {
        Self {
            pnl: pnl.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl OrderSink for ScriptedSink {
    fn create_order(&mut self, instrument: &str, units: i64) -> Result<OrderFill, BrokerError> {
        let attempt = self.attempts.len();
        self.attempts.push(units);
        if self.fail_on == Some(attempt) {
            return Err(BrokerError::BrokerOrderFailure {
                instrument: instrument.to_string(),
                units,
                reason: "rejected".into(),
            });
        }
        let quote = self.last.unwrap_or_else(|| tick(0, 1.0));
        Ok(OrderFill {
            fill_time: quote.timestamp,
            fill_price: quote.bid,
            units,
            realized_pnl: self.pnl.pop_front().unwrap_or(0.0),
        })
    }

    fn observe_tick(&mut self, tick: &Tick) {
        self.last = Some(*tick);
    }
}

fn dispatcher(sink: ScriptedSink, stops: StopConditions) -> LiveDispatcher<ScriptedSink> {
    let mut config = DispatchConfig::new("EUR_USD", 100);
    config.stops = stops;
    let aggregator = BarAggregator::new(Duration::minutes(1)).unwrap();
    LiveDispatcher::new(config, sink, Box::new(Threshold), aggregator, Vec::new()).unwrap()
}

fn feed(d: &mut LiveDispatcher<ScriptedSink>, ticks: &[Tick]) -> DispatchState {
    let mut state = d.state();
    for t in ticks {
        state = d.on_tick(*t).unwrap();
    }
    state
}

// ──────────────────────────────────────────────
// Dispatcher
// ──────────────────────────────────────────────

#[test]
fn stop_loss_uses_cumulative_profit() {
    let stops = StopConditions {
        stop_loss: Some(-8.0),
        ..StopConditions::none()
    };
    let mut d = dispatcher(ScriptedSink::with_pnl(&[5.0, -8.0, -7.0]), stops);

    // Bars at +60, +120, +180 carry 2.0, 1.0, 2.0: long, flip short, flip long.
    let state = feed(
        &mut d,
        &[tick(0, 2.0), tick(60, 1.0), tick(120, 2.0), tick(180, 1.0)],
    );
    assert_eq!(state, DispatchState::Running);
    assert!((d.profit() + 10.0).abs() < 1e-12);
    assert_eq!(d.position(), Position::Long);

    // Cumulative -3 after the flip did not trigger; -10 does on the next tick.
    let state = d.on_tick(tick(190, 1.0)).unwrap();
    assert_eq!(state, DispatchState::Stopped(StopReason::StopLoss));
    assert_eq!(d.sink().attempts, vec![100, -200, 200, -100]);
    assert_eq!(d.units_held(), 0);
    assert_eq!(d.position(), Position::Neutral);
}

#[test]
fn flip_trades_twice_the_size_and_neutral_trades_the_rest() {
    let mut d = dispatcher(ScriptedSink::default(), StopConditions::none());
    feed(
        &mut d,
        &[tick(0, 2.0), tick(60, 1.0), tick(120, 1.5), tick(180, 1.5)],
    );
    // +100 to go long, -200 to flip short, +100 to go neutral.
    assert_eq!(d.sink().attempts, vec![100, -200, 100]);
    assert_eq!(d.units_held(), 0);
    assert_eq!(d.fills().len(), 3);
}

#[test]
fn repeated_signal_places_no_order() {
    let mut d = dispatcher(ScriptedSink::default(), StopConditions::none());
    feed(
        &mut d,
        &[tick(0, 2.0), tick(60, 2.1), tick(120, 2.2), tick(180, 2.3)],
    );
    assert_eq!(d.sink().attempts, vec![100]);
    assert_eq!(d.bars().len(), 3);
}

#[test]
fn broker_failure_stops_after_closing() {
    let sink = ScriptedSink {
        fail_on: Some(1),
        ..ScriptedSink::default()
    };
    let mut d = dispatcher(sink, StopConditions::none());
    feed(&mut d, &[tick(0, 2.0), tick(60, 1.0)]);

    let err = d.on_tick(tick(120, 2.0)).unwrap_err();
    assert!(matches!(
        err,
        LiveError::Broker(BrokerError::BrokerOrderFailure { units: -200, .. })
    ));
    assert_eq!(d.state(), DispatchState::Stopped(StopReason::BrokerFailure));
    // Failed flip, then the close-out of the open long.
    assert_eq!(d.sink().attempts, vec![100, -200, -100]);
    assert_eq!(d.units_held(), 0);

    // Stopped is terminal.
    assert_eq!(
        d.on_tick(tick(180, 1.0)).unwrap(),
        DispatchState::Stopped(StopReason::BrokerFailure)
    );
    assert_eq!(d.sink().attempts.len(), 3);
}

#[test]
fn stop_datetime_flattens_before_processing() {
    let stops = StopConditions {
        stop_datetime: Some(base() + Duration::seconds(150)),
        ..StopConditions::none()
    };
    let mut d = dispatcher(ScriptedSink::default(), stops);
    let state = feed(
        &mut d,
        &[tick(0, 2.0), tick(60, 1.0), tick(120, 2.0), tick(180, 1.0)],
    );
    assert_eq!(state, DispatchState::Stopped(StopReason::StopDatetime));
    // The tick at +180 never reached the aggregator.
    assert_eq!(d.bars().len(), 2);
    assert_eq!(d.sink().attempts, vec![100, -200, 100]);
}

#[test]
fn crossed_tick_after_stop_time_is_rejected_first() {
    let stops = StopConditions {
        stop_datetime: Some(base() + Duration::seconds(150)),
        ..StopConditions::none()
    };
    let mut d = dispatcher(ScriptedSink::default(), stops);
    feed(&mut d, &[tick(0, 1.0), tick(60, 1.0)]);
    assert_eq!(d.units_held(), -100);

    let crossed = Tick::new(base() + Duration::seconds(160), 1.2, 0.5);
    assert!(matches!(d.on_tick(crossed), Err(LiveError::Aggregation(_))));
    assert_eq!(d.state(), DispatchState::Running);
    assert_eq!(d.sink().attempts, vec![-100]);
    assert_eq!(d.sink().last.map(|t| t.bid), Some(1.0));
    assert_eq!(d.aggregation_report().ticks_rejected, 1);

    // The next valid tick stops the session and covers at its own quote.
    let state = d.on_tick(tick(170, 1.1)).unwrap();
    assert_eq!(state, DispatchState::Stopped(StopReason::StopDatetime));
    assert_eq!(d.sink().attempts, vec![-100, 100]);
    assert_eq!(d.fills()[1].fill_price, 1.1);
}

#[test]
fn close_position_is_idempotent() {
    let mut d = dispatcher(ScriptedSink::default(), StopConditions::none());
    feed(&mut d, &[tick(0, 2.0), tick(60, 2.0)]);
    d.close_position(StopReason::StreamEnded).unwrap();
    d.close_position(StopReason::StreamEnded).unwrap();
    assert_eq!(d.sink().attempts, vec![100, -100]);
}

#[test]
fn rejects_non_positive_units() {
    let config = DispatchConfig::new("EUR_USD", 0);
    let aggregator = BarAggregator::new(Duration::minutes(1)).unwrap();
    let result = LiveDispatcher::new(
        config,
        ScriptedSink::default(),
        Box::new(Threshold),
        aggregator,
        Vec::new(),
    );
    assert!(matches!(result, Err(LiveError::InvalidConfig(_))));
}

// ──────────────────────────────────────────────
// Session
// ──────────────────────────────────────────────

#[test]
fn session_closes_when_stream_ends() {
    let d = dispatcher(ScriptedSink::default(), StopConditions::none());
    let mut session = LiveSession::from_dispatcher(d);

    let summary = session
        .run(vec![tick(0, 2.0), tick(60, 1.0), tick(120, 1.0)])
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::StreamEnded);
    assert_eq!(summary.final_position, Position::Neutral);
    // Long, flip short, close.
    assert_eq!(summary.orders, 3);
    assert_eq!(session.dispatcher().sink().attempts, vec![100, -200, 100]);
}

#[test]
fn session_drops_bad_ticks_and_keeps_going() {
    let d = dispatcher(ScriptedSink::default(), StopConditions::none());
    let mut session = LiveSession::from_dispatcher(d);

    let crossed = Tick::new(base() + Duration::seconds(70), 1.2, 1.1);
    let summary = session
        .run(vec![
            tick(0, 2.0),
            tick(30, 2.0),
            tick(20, 2.0),
            crossed,
            tick(59, 2.0),
        ])
        .unwrap();

    assert_eq!(summary.dropped_ticks, 2);
    assert_eq!(summary.aggregation.ticks_rejected, 2);
    assert_eq!(summary.orders, 0);
}

#[test]
fn session_reports_stop_reason_from_dispatcher() {
    let stops = StopConditions {
        stop_profit: Some(1.0),
        ..StopConditions::none()
    };
    let d = dispatcher(ScriptedSink::with_pnl(&[2.0]), stops);
    let mut session = LiveSession::from_dispatcher(d);

    let summary = session
        .run(vec![tick(0, 2.0), tick(60, 2.0), tick(61, 2.0), tick(120, 1.0)])
        .unwrap();
    assert_eq!(summary.stop_reason, StopReason::StopProfit);
    assert_eq!(session.dispatcher().sink().attempts, vec![100, -100]);
}

// ── Opening ──

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Five-second candles ending `lag` before `now`.
struct CannedHistory {
    points: Vec<PricePoint>,
    calls: Cell<usize>,
}

impl CannedHistory {
    fn ending_before(now: DateTime<Utc>, lag: Duration) -> Self {
        let end = now - lag;
        let points = (0..720)
            .rev()
            .map(|k| PricePoint {
                timestamp: end - Duration::seconds(5 * k),
                price: 2.0,
            })
            .collect();
        Self {
            points,
            calls: Cell::new(0),
        }
    }
}

impl MarketDataSource for CannedHistory {
    fn name(&self) -> &str {
        "canned"
    }

    fn get_history(
        &self,
        _request: &HistoryRequest<'_>,
        side: PriceSide,
    ) -> Result<Vec<PricePoint>, DataError> {
        self.calls.set(self.calls.get() + 1);
        let offset = if side == PriceSide::Ask { 0.0002 } else { 0.0 };
        Ok(self
            .points
            .iter()
            .map(|p| PricePoint {
                timestamp: p.timestamp,
                price: p.price + offset,
            })
            .collect())
    }
}

fn live_config(attempts: usize) -> LiveConfig {
    let mut config = LiveConfig::new(DispatchConfig::new("EUR_USD", 100), Duration::minutes(1));
    config.max_history_attempts = attempts;
    config
}

#[test]
fn open_refuses_when_market_closed() {
    // Saturday 2023-11-18 12:00 UTC.
    let saturday = Utc.timestamp_opt(1_700_308_800, 0).unwrap();
    let source = CannedHistory::ending_before(saturday, Duration::seconds(5));
    let result = LiveSession::open(
        live_config(3),
        &source,
        ScriptedSink::default(),
        Box::new(Threshold),
        &FixedClock(saturday),
    );
    assert!(matches!(result, Err(LiveError::MarketClosed { .. })));
    assert_eq!(source.calls.get(), 0);
}

#[test]
fn open_retries_stale_history_then_gives_up() {
    let now = base() + Duration::seconds(30);
    let source = CannedHistory::ending_before(now, Duration::hours(1));
    let result = LiveSession::open(
        live_config(3),
        &source,
        ScriptedSink::default(),
        Box::new(Threshold),
        &FixedClock(now),
    );
    assert!(matches!(result, Err(LiveError::StaleHistory { attempts: 3 })));
    // Bid and ask per attempt.
    assert_eq!(source.calls.get(), 6);
}

#[test]
fn open_seeds_from_fresh_history_and_trades() {
    let now = base() + Duration::seconds(30);
    let source = CannedHistory::ending_before(now, Duration::seconds(5));
    let mut session = LiveSession::open(
        live_config(3),
        &source,
        ScriptedSink::default(),
        Box::new(Threshold),
        &FixedClock(now),
    )
    .unwrap();

    let seeded = session.dispatcher().bars().len();
    assert!(seeded > 0);
    assert_eq!(session.dispatcher().bars().last().unwrap().timestamp, base());

    // The next boundary is finalized from history ticks plus the stream.
    let summary = session.run(vec![tick(40, 1.0), tick(61, 1.0)]).unwrap();
    assert_eq!(session.dispatcher().bars().len(), seeded + 1);
    assert_eq!(session.dispatcher().bars().last().unwrap().bid_price, 1.0);
    assert_eq!(summary.stop_reason, StopReason::StreamEnded);
    assert_eq!(session.dispatcher().sink().attempts, vec![-100, 100]);
}
