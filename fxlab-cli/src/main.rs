//! FxLab CLI — backtests, optimization sweeps and tick replays from a TOML
//! config file.
//!
//! Commands:
//! - `backtest`: iterative simulation with spread-adjusted execution
//! - `vectorized`: log-return backtest with proportional trading costs
//! - `optimize`: parameter sweep over the `[sweep]` ranges
//! - `replay`: stream ticks through the live dispatcher and a paper broker
//! - `costs`: share of bars per UTC hour that cover their spread

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Duration, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fxlab_runner::config::FxLabConfig;
use fxlab_runner::data_loader::load_ticks_csv;
use fxlab_runner::{
    cost_coverage, load_bars, load_config, replay_ticks, run_backtest, run_optimization,
    run_vectorized_backtest, write_artifact, Artifact, Engine, ReplayConfig, SyntheticSource,
};

#[derive(Parser)]
#[command(name = "fxlab", about = "FxLab CLI: FX strategy backtesting and replay")]
struct Cli {
    /// Log level filter (overridden by FXLAB_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Iterative backtest of the configured strategy.
    Backtest {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for result JSON.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Vectorized backtest of the configured strategy.
    Vectorized {
        #[arg(long)]
        config: PathBuf,

        /// Override `backtest.trading_cost`.
        #[arg(long)]
        trading_cost: Option<f64>,

        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Grid search over the `[sweep]` ranges.
    Optimize {
        #[arg(long)]
        config: PathBuf,

        /// Override `sweep.engine`.
        #[arg(long, value_enum)]
        engine: Option<EngineArg>,

        /// Override `sweep.top`.
        #[arg(long)]
        top: Option<usize>,

        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replay ticks through the live dispatcher with a paper broker.
    Replay {
        /// Config with a `[live]` section.
        #[arg(long)]
        config: PathBuf,

        /// Tick CSV (`timestamp,bid,ask`). Synthetic ticks when omitted.
        #[arg(long)]
        ticks: Option<PathBuf>,

        /// Number of synthetic ticks.
        #[arg(long, default_value_t = 5_000)]
        count: usize,

        /// Leading ticks used as history.
        #[arg(long, default_value_t = 0)]
        warmup: usize,

        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Hourly trading-cost coverage of the configured data.
    Costs {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    Vectorized,
    Iterative,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Vectorized => Engine::Vectorized,
            EngineArg::Iterative => Engine::Iterative,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Backtest { config, out } => run_backtest_cmd(&config, out.as_deref()),
        Commands::Vectorized {
            config,
            trading_cost,
            out,
        } => run_vectorized_cmd(&config, trading_cost, out.as_deref()),
        Commands::Optimize {
            config,
            engine,
            top,
            out,
        } => run_optimize_cmd(&config, engine, top, out.as_deref()),
        Commands::Replay {
            config,
            ticks,
            count,
            warmup,
            out,
        } => run_replay_cmd(&config, ticks.as_deref(), count, warmup, out.as_deref()),
        Commands::Costs { config, out } => run_costs_cmd(&config, out.as_deref()),
    }
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = match std::env::var("FXLAB_LOG") {
        Ok(directives) => EnvFilter::try_new(directives),
        Err(_) => EnvFilter::try_new(level),
    }
    .context("invalid log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<FxLabConfig> {
    load_config(path).with_context(|| format!("failed to load config {}", path.display()))
}

fn save<T: Serialize>(out: Option<&Path>, name: &str, artifact: &Artifact<T>) -> Result<()> {
    if let Some(dir) = out {
        let path = write_artifact(dir, name, artifact)?;
        println!("Artifact saved to: {}", path.display());
    }
    Ok(())
}

fn run_backtest_cmd(config_path: &Path, out: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let outcome = run_backtest(&config)?;
    let report = &outcome.report;

    println!("Strategy:        {}", report.strategy);
    println!("Run:             {}", outcome.run_id);
    println!("Source:          {}", outcome.source);
    println!("Bars:            {}", report.bars);
    println!("Initial balance: {:.2}", report.initial_balance);
    println!("Final balance:   {:.2}", report.final_balance);
    println!("Performance:     {:.2}%", report.performance_pct);
    println!("Buy and hold:    {:.4}", report.buy_and_hold);
    println!("Out-performance: {:+.4}", report.out_performance);
    println!("Trades:          {}", report.trade_count);
    println!("Flips:           {}", report.flip_count());

    let artifact = Artifact::new("backtest", &config.backtest.instrument, outcome.clone())
        .with_dataset(outcome.run_id.dataset.clone(), outcome.synthetic);
    save(out, "backtest", &artifact)
}

fn run_vectorized_cmd(
    config_path: &Path,
    trading_cost: Option<f64>,
    out: Option<&Path>,
) -> Result<()> {
    let mut config = read_config(config_path)?;
    if let Some(tc) = trading_cost {
        config.backtest.trading_cost = tc;
        config.validate()?;
    }
    let outcome = run_vectorized_backtest(&config)?;
    let report = &outcome.report;

    println!("Strategy:        {}", report.strategy);
    println!("Run:             {}", outcome.run_id);
    println!("Rows:            {}", report.rows.len());
    println!("Trading cost:    {}", report.trading_cost);
    println!("Performance:     {:.4}", report.performance);
    println!("Buy and hold:    {:.4}", report.buy_and_hold);
    println!("Out-performance: {:+.4}", report.out_performance);
    println!("Trades:          {}", report.trades);

    let artifact = Artifact::new("vectorized", &config.backtest.instrument, outcome.clone())
        .with_dataset(outcome.run_id.dataset.clone(), outcome.synthetic);
    save(out, "vectorized", &artifact)
}

fn run_optimize_cmd(
    config_path: &Path,
    engine: Option<EngineArg>,
    top: Option<usize>,
    out: Option<&Path>,
) -> Result<()> {
    let mut config = read_config(config_path)?;
    let Some(sweep) = config.sweep.as_mut() else {
        bail!("{} has no [sweep] section", config_path.display());
    };
    if let Some(engine) = engine {
        sweep.engine = engine.into();
    }
    if let Some(top) = top {
        sweep.top = top;
    }

    let outcome = run_optimization(&config)?;
    let results = &outcome.report;

    println!(
        "{} candidates ({} skipped, {} failed), engine {:?}",
        results.candidates,
        results.skipped,
        results.failed.len(),
        results.engine
    );
    println!("{:<4} {:<14} {:>12} {:>12} {:>7}  params", "#", "id", "perf", "out-perf", "trades");
    for (rank, trial) in results.trials.iter().enumerate() {
        println!(
            "{:<4} {:<14} {:>12.4} {:>+12.4} {:>7}  {}",
            rank + 1,
            trial.id.short(),
            trial.performance,
            trial.out_performance,
            trial.trades,
            serde_json::to_string(&trial.params)?,
        );
    }

    let artifact = Artifact::new("optimize", &config.backtest.instrument, outcome.clone())
        .with_dataset(outcome.run_id.dataset.clone(), outcome.synthetic);
    save(out, "optimize", &artifact)
}

fn run_replay_cmd(
    config_path: &Path,
    ticks_path: Option<&Path>,
    count: usize,
    warmup: usize,
    out: Option<&Path>,
) -> Result<()> {
    let config = read_config(config_path)?;
    let Some(live) = config.live.as_ref() else {
        bail!("{} has no [live] section", config_path.display());
    };
    let instrument = config.backtest.instrument.as_str();

    let ticks = match ticks_path {
        Some(path) => load_ticks_csv(path)
            .with_context(|| format!("failed to load ticks {}", path.display()))?,
        None => {
            let start = config
                .backtest
                .start
                .or_else(|| Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single())
                .unwrap_or_default();
            info!(count, "no tick file given, generating synthetic ticks");
            SyntheticSource::default().ticks(instrument, start, count, Duration::seconds(5))
        }
    };

    let replay = ReplayConfig {
        dispatch: live.dispatch_config(instrument),
        bar_length: live.bar_length()?,
        warmup_ticks: warmup,
    };
    let strategy = config.strategy.build(config.backtest.price_field)?;
    let summary = replay_ticks(&ticks, strategy, replay)?;

    println!("Ticks:           {}", ticks.len());
    println!("Stop reason:     {:?}", summary.stop_reason);
    println!("Orders:          {}", summary.orders);
    println!("Dropped ticks:   {}", summary.dropped_ticks);
    println!("Bars emitted:    {}", summary.aggregation.bars_emitted);
    println!("Profit:          {:+.5}", summary.profit);

    let artifact = Artifact::new("replay", instrument, summary);
    save(out, "replay", &artifact)
}

fn run_costs_cmd(config_path: &Path, out: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let loaded = load_bars(&config.backtest)?;
    let coverage = cost_coverage(&loaded.bars);

    println!("{:<6} {:>7} {:>8} {:>7}", "hour", "bars", "covered", "share");
    for (hour, c) in &coverage.hours {
        println!(
            "{:<6} {:>7} {:>8} {:>6.1}%",
            format!("{hour:02}:00"),
            c.bars,
            c.covered,
            c.share() * 100.0
        );
    }
    if let Some((hour, share)) = coverage.best_hour() {
        println!("Best hour: {hour:02}:00 UTC ({:.1}%)", share * 100.0);
    }

    let artifact = Artifact::new("costs", &config.backtest.instrument, coverage)
        .with_dataset(loaded.dataset_hash, loaded.synthetic);
    save(out, "costs", &artifact)
}
