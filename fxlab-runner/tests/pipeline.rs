//! Integration tests for the runner pipeline.
//!
//! Tests:
//! 1. A quotes CSV written from bars loads back with the same dataset hash
//! 2. A config file pointing at a CSV drives an iterative backtest
//! 3. Sweeps rank every grid candidate with both engines
//! 4. Tick replay through the paper broker ends flat with consistent P/L
//! 5. Backtest outcomes survive an artifact round trip

use std::path::Path;

use chrono::{Duration, TimeZone, Utc};

use fxlab_core::domain::Position;
use fxlab_core::engine::SimulationReport;
use fxlab_core::fingerprint::DatasetHash;
use fxlab_core::live::StopReason;
use fxlab_runner::data_loader::{load_quotes_csv, write_quotes_csv};
use fxlab_runner::{
    load_bars, load_config, read_artifact, replay_ticks, run_backtest, run_optimization,
    write_artifact, Artifact, Engine, FxLabConfig, ReplayConfig, RunOutcome, SyntheticSource,
};

const SYNTHETIC: &str = r#"
    [backtest]
    instrument = "EUR_USD"
    granularity = "M30"
    start = "2024-01-02T00:00:00Z"
    end = "2024-01-12T00:00:00Z"
    initial_balance = 10000.0
    trading_cost = 0.00007

    [strategy]
    type = "sma_cross"
    short = 4
    long = 20

    [sweep]
    top = 10

    [sweep.ranges]
    short = { start = 2, end = 6, step = 2 }
    long = { start = 10, end = 30, step = 10 }
"#;

fn write_config_with_data(dir: &Path, csv: &Path) -> std::path::PathBuf {
    let path = dir.join("run.toml");
    let content = format!(
        r#"
        [backtest]
        instrument = "EUR_USD"
        initial_balance = 10000.0
        data = "{}"

        [strategy]
        type = "momentum"
        window = 3
        "#,
        csv.display()
    );
    std::fs::write(&path, content).unwrap();
    path
}

// ── 1 ──

#[test]
fn csv_round_trip_preserves_dataset_hash() {
    let config = FxLabConfig::from_toml_str(SYNTHETIC).unwrap();
    let loaded = load_bars(&config.backtest).unwrap();
    assert!(loaded.synthetic);
    assert!(!loaded.bars.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("eurusd.csv");
    write_quotes_csv(&csv, &loaded.bars).unwrap();

    let reloaded = load_quotes_csv(&csv).unwrap();
    assert_eq!(reloaded.len(), loaded.bars.len());
    assert_eq!(DatasetHash::of(&reloaded), loaded.dataset_hash);
}

// ── 2 ──

#[test]
fn config_file_drives_backtest_on_csv() {
    let synthetic = FxLabConfig::from_toml_str(SYNTHETIC).unwrap();
    let bars = load_bars(&synthetic.backtest).unwrap().bars;

    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("eurusd.csv");
    write_quotes_csv(&csv, &bars).unwrap();

    let config = load_config(&write_config_with_data(dir.path(), &csv)).unwrap();
    let outcome = run_backtest(&config).unwrap();

    assert!(!outcome.synthetic);
    assert!(outcome.source.starts_with("csv:"));
    assert_eq!(outcome.report.bars, bars.len());
    assert_eq!(outcome.run_id.dataset, DatasetHash::of(&bars));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}

// ── 3 ──

#[test]
fn sweep_ranks_all_candidates_with_both_engines() {
    for engine in [Engine::Vectorized, Engine::Iterative] {
        let mut config = FxLabConfig::from_toml_str(SYNTHETIC).unwrap();
        if let Some(sweep) = config.sweep.as_mut() {
            sweep.engine = engine;
        }

        let outcome = run_optimization(&config).unwrap();
        let results = &outcome.report;

        assert_eq!(results.engine, engine);
        assert_eq!(results.candidates, 4);
        assert_eq!(results.skipped, 0);
        assert!(results.failed.is_empty());
        assert_eq!(results.trials.len(), 4);
        for pair in results.trials.windows(2) {
            assert!(pair[0].performance >= pair[1].performance);
        }
    }
}

// ── 4 ──

#[test]
fn replay_through_paper_broker_ends_flat() {
    let start = Utc.with_ymd_and_hms(2024, 1, 3, 8, 0, 0).unwrap();
    let ticks = SyntheticSource::default().ticks("EUR_USD", start, 3_000, Duration::seconds(5));

    let config = FxLabConfig::from_toml_str(
        r#"
        [backtest]
        instrument = "EUR_USD"
        initial_balance = 10000.0

        [strategy]
        type = "sma_cross"
        short = 2
        long = 5

        [live]
        units = 1000
        bar_length = "1min"
        "#,
    )
    .unwrap();
    let live = config.live.as_ref().unwrap();
    let replay = ReplayConfig {
        dispatch: live.dispatch_config(&config.backtest.instrument),
        bar_length: live.bar_length().unwrap(),
        warmup_ticks: 300,
    };
    let strategy = config.strategy.build(config.backtest.price_field).unwrap();

    let summary = replay_ticks(&ticks, strategy, replay).unwrap();

    assert_eq!(summary.stop_reason, StopReason::StreamEnded);
    assert_eq!(summary.final_position, Position::Neutral);
    assert_eq!(summary.orders, summary.fills.len());
    assert_eq!(summary.fills.iter().map(|f| f.units).sum::<i64>(), 0);
    let realized: f64 = summary.fills.iter().map(|f| f.realized_pnl).sum();
    assert!((summary.profit - realized).abs() < 1e-9);
    assert_eq!(summary.dropped_ticks, 0);
}

// ── 5 ──

#[test]
fn backtest_outcome_survives_artifact_round_trip() {
    let config = FxLabConfig::from_toml_str(SYNTHETIC).unwrap();
    let outcome = run_backtest(&config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let artifact = Artifact::new("backtest", &config.backtest.instrument, outcome.clone())
        .with_dataset(outcome.run_id.dataset.clone(), outcome.synthetic);
    let path = write_artifact(dir.path(), "backtest", &artifact).unwrap();

    let loaded: Artifact<RunOutcome<SimulationReport>> = read_artifact(&path).unwrap();
    assert_eq!(loaded.report.run_id, outcome.run_id);
    assert_eq!(loaded.report.report.trade_count, outcome.report.trade_count);
    assert!(loaded.synthetic);
}
