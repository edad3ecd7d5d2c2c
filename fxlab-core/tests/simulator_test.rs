//! Integration tests for the iterative simulator.
//!
//! Tests:
//! 1. SMA crossover scenario: long entry, one flip, terminal close
//! 2. Trade count follows from transitions (entries + flips + close)
//! 3. Every strategy family runs end-to-end on a synthetic walk
//! 4. Reusing a simulator gives identical independent runs
//! 5. Spread costs make the same path strictly worse

use chrono::{Duration, TimeZone, Utc};

use fxlab_core::domain::{Bar, Position, PriceField};
use fxlab_core::engine::{simulate, IterativeSimulator, SimulationConfig, SimulationError};
use fxlab_core::ledger::{ExecutionKind, OrderSize};
use fxlab_core::strategy::{StrategyParams, StrategySignalSource};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn bars_with_spread(prices: &[f64], spread: f64) -> Vec<Bar> {
    let start = Utc.timestamp_opt(1_700_000_040, 0).unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, p)| {
            Bar::from_quote(start + Duration::minutes(i as i64), *p, p + spread).unwrap()
        })
        .collect()
}

fn flat_bars(prices: &[f64]) -> Vec<Bar> {
    bars_with_spread(prices, 0.0)
}

/// Deterministic oscillating walk, enough swings to trigger every family.
fn wave(n: usize) -> Vec<Bar> {
    let prices: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64;
            1.10 + 0.01 * (t * 0.15).sin() + 0.003 * (t * 0.9).cos()
        })
        .collect();
    bars_with_spread(&prices, 0.0002)
}

fn build(params: StrategyParams) -> Box<dyn StrategySignalSource> {
    params.build(PriceField::Bid).unwrap()
}

// ──────────────────────────────────────────────
// SMA crossover scenario
// ──────────────────────────────────────────────

#[test]
fn sma_cross_scenario_long_then_flip() {
    let bars = flat_bars(&[10.0, 10.0, 10.0, 20.0, 20.0, 10.0, 10.0]);
    let strategy = build(StrategyParams::SmaCross { short: 1, long: 2 });
    let config = SimulationConfig::new(1000.0).without_spread();

    let report = simulate(&bars, strategy.as_ref(), &config).unwrap();

    // Long 50 @ 20 on bar 3, flip to short 50 @ 10 on bar 5, buy back @ 10.
    assert_eq!(report.transitions.len(), 2);
    assert_eq!(report.transitions[0].bar_index, 3);
    assert_eq!(report.transitions[0].to, Position::Long);
    assert_eq!(report.transitions[1].bar_index, 5);
    assert_eq!(report.transitions[1].to, Position::Short);

    assert_eq!(report.trade_count, 3);
    assert_eq!(report.flip_count(), 1);
    assert!((report.final_balance - 500.0).abs() < 1e-9);
    assert!((report.performance - 0.5).abs() < 1e-12);
    assert!((report.performance_pct + 50.0).abs() < 1e-9);
    assert!((report.buy_and_hold - 1.0).abs() < 1e-12);
    assert!((report.out_performance + 0.5).abs() < 1e-12);

    let units: Vec<i64> = report.executions.iter().map(|e| e.units_after).collect();
    assert_eq!(units, vec![50, -50, 0]);
}

#[test]
fn trade_count_is_entries_plus_flips_plus_close() {
    let bars = wave(400);
    for params in [
        StrategyParams::SmaCross { short: 5, long: 20 },
        StrategyParams::Momentum { window: 3 },
        StrategyParams::Contrarian { window: 3 },
    ] {
        let strategy = build(params);
        let report = simulate(&bars, strategy.as_ref(), &SimulationConfig::new(10_000.0)).unwrap();

        let closes = report
            .executions
            .iter()
            .filter(|e| e.kind == ExecutionKind::Close)
            .count();
        assert!(closes <= 1);
        // One order per transition, flips included.
        assert_eq!(report.trade_count, report.transitions.len() + closes);
    }
}

// ──────────────────────────────────────────────
// End-to-end runs
// ──────────────────────────────────────────────

#[test]
fn every_family_runs_and_ends_flat() {
    let bars = wave(300);
    let families = [
        StrategyParams::SmaCross { short: 5, long: 20 },
        StrategyParams::BollingerBands {
            window: 20,
            deviation: 1.0,
        },
        StrategyParams::Contrarian { window: 2 },
        StrategyParams::Momentum { window: 2 },
        StrategyParams::MlClassification {
            lags: 3,
            training_bars: 150,
            learning_rate: 0.1,
            iterations: 300,
        },
        StrategyParams::MlRegression {
            lags: 3,
            training_bars: 150,
        },
    ];

    for params in families {
        let strategy = build(params.clone());
        let mut sim = IterativeSimulator::new(SimulationConfig::new(10_000.0)).unwrap();
        let report = sim.run(&bars, strategy.as_ref()).unwrap();

        assert_eq!(sim.ledger().units_held(), 0, "{params:?} left a position open");
        assert!(report.final_balance.is_finite());
        assert!(report.final_balance > 0.0);
        assert_eq!(report.bars, bars.len());
    }
}

#[test]
fn reused_simulator_has_no_carryover() {
    let bars = wave(250);
    let strategy = build(StrategyParams::SmaCross { short: 3, long: 12 });
    let mut sim = IterativeSimulator::new(SimulationConfig::new(5_000.0)).unwrap();

    let first = sim.run(&bars, strategy.as_ref()).unwrap();
    let second = sim.run(&bars, strategy.as_ref()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn spread_makes_the_same_path_worse() {
    let bars = wave(300);
    let strategy = build(StrategyParams::Momentum { window: 2 });

    let mut config = SimulationConfig::new(10_000.0);
    config.order_size = OrderSize::Units(1_000);

    let with = simulate(&bars, strategy.as_ref(), &config).unwrap();
    let without = simulate(&bars, strategy.as_ref(), &config.clone().without_spread()).unwrap();

    assert!(with.trade_count > 0);
    assert!(with.final_balance < without.final_balance);
}

#[test]
fn too_short_history_is_rejected() {
    let bars = flat_bars(&[1.0]);
    let strategy = build(StrategyParams::Momentum { window: 1 });
    let err = simulate(&bars, strategy.as_ref(), &SimulationConfig::new(100.0)).unwrap_err();
    assert!(matches!(err, SimulationError::NotEnoughBars { .. }));
}
