//! Bar and tick loading for the runner.
//!
//! Two `MarketDataSource` implementations stand in for a broker's history
//! endpoint:
//! - `CsvQuoteSource`: a `timestamp,bid,ask` file already at the wanted
//!   granularity.
//! - `SyntheticSource`: a seeded random walk, for demos and tests. Results
//!   produced on it are tagged as synthetic.
//!
//! Both are consumed through `fxlab_core::data::fetch_bars`, exactly like a
//! live history collaborator.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use fxlab_core::data::{
    fetch_bars, DataError, HistoryRequest, MarketDataSource, PricePoint, PriceSide,
};
use fxlab_core::domain::{validate_bars, Bar, BarError, Granularity, Tick};
use fxlab_core::fingerprint::DatasetHash;
use fxlab_core::live::MarketHours;

use crate::config::BacktestSection;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Quality(#[from] BarError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("{path} contains no rows")]
    Empty { path: PathBuf },
}

/// One CSV row: `timestamp,bid,ask` with RFC 3339 timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct QuoteRow {
    timestamp: DateTime<Utc>,
    bid: f64,
    ask: f64,
}

fn read_rows(path: &Path) -> Result<Vec<QuoteRow>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<QuoteRow>, _>>()?;
    if rows.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(rows)
}

/// Load a quotes file as validated bars.
pub fn load_quotes_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let bars = read_rows(path)?
        .into_iter()
        .map(|r| Bar::from_quote(r.timestamp, r.bid, r.ask))
        .collect::<Result<Vec<_>, _>>()?;
    validate_bars(&bars)?;
    Ok(bars)
}

/// Load a tick file. Ticks are not validated here: the aggregator rejects
/// crossed or out-of-order ticks one by one.
pub fn load_ticks_csv(path: &Path) -> Result<Vec<Tick>, LoadError> {
    Ok(read_rows(path)?
        .into_iter()
        .map(|r| Tick::new(r.timestamp, r.bid, r.ask))
        .collect())
}

/// Write bars as a quotes file readable by [`load_quotes_csv`].
pub fn write_quotes_csv(path: &Path, bars: &[Bar]) -> Result<(), LoadError> {
    let mut writer = csv::Writer::from_path(path)?;
    for bar in bars {
        writer.serialize(QuoteRow {
            timestamp: bar.timestamp,
            bid: bar.bid_price,
            ask: bar.ask_price,
        })?;
    }
    writer.flush().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Write ticks in the same `timestamp,bid,ask` layout.
pub fn write_ticks_csv(path: &Path, ticks: &[Tick]) -> Result<(), LoadError> {
    let mut writer = csv::Writer::from_path(path)?;
    for t in ticks {
        writer.serialize(QuoteRow {
            timestamp: t.timestamp,
            bid: t.bid,
            ask: t.ask,
        })?;
    }
    writer.flush().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn side_price(bar: &Bar, side: PriceSide) -> f64 {
    match side {
        PriceSide::Bid => bar.bid_price,
        PriceSide::Ask => bar.ask_price,
        PriceSide::Mid => bar.mid_price,
    }
}

/// History source backed by a quotes CSV.
#[derive(Debug, Clone)]
pub struct CsvQuoteSource {
    name: String,
    bars: Vec<Bar>,
}

impl CsvQuoteSource {
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        Ok(Self {
            name: format!("csv:{}", path.display()),
            bars: load_quotes_csv(path)?,
        })
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }
}

impl MarketDataSource for CsvQuoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    /// Rows in `[start, end]`; the file's own granularity is used as is.
    fn get_history(
        &self,
        request: &HistoryRequest<'_>,
        side: PriceSide,
    ) -> Result<Vec<PricePoint>, DataError> {
        Ok(self
            .bars
            .iter()
            .filter(|b| b.timestamp >= request.start && b.timestamp <= request.end)
            .map(|b| PricePoint {
                timestamp: b.timestamp,
                price: side_price(b, side),
            })
            .collect())
    }
}

/// Seeded random-walk quotes, one per granularity step while the FX market
/// is open.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub seed: u64,
    pub start_price: f64,
    pub spread: f64,
    /// Maximum absolute relative move per step.
    pub volatility: f64,
    pub market_hours: MarketHours,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self {
            seed: 42,
            start_price: 1.10,
            spread: 0.00015,
            volatility: 0.001,
            market_hours: MarketHours::fx(),
        }
    }
}

impl SyntheticSource {
    fn rng(&self, instrument: &str) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(instrument.as_bytes());
        hasher.update(&self.seed.to_le_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }

    /// Deterministic bid walk; the ask is `bid + spread`.
    fn walk(&self, request: &HistoryRequest<'_>) -> Vec<(DateTime<Utc>, f64)> {
        let step = request.granularity.duration();
        let mut rng = self.rng(request.instrument);
        let mut price = self.start_price;
        let mut ts = request.start;
        let mut points = Vec::new();
        while ts <= request.end {
            if self.market_hours.is_open(ts) {
                let change: f64 = rng.gen_range(-self.volatility..=self.volatility);
                price *= 1.0 + change;
                points.push((ts, price));
            }
            ts += step;
        }
        points
    }

    /// Tick stream with irregular spacing around `mean_gap`.
    pub fn ticks(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        count: usize,
        mean_gap: Duration,
    ) -> Vec<Tick> {
        let mut rng = self.rng(instrument);
        let gap_ms = mean_gap.num_milliseconds().max(2);
        let mut price = self.start_price;
        let mut ts = start;
        (0..count)
            .map(|_| {
                ts += Duration::milliseconds(rng.gen_range(1..=2 * gap_ms));
                price *= 1.0 + rng.gen_range(-self.volatility..=self.volatility);
                Tick::new(ts, price, price + self.spread)
            })
            .collect()
    }
}

impl MarketDataSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn get_history(
        &self,
        request: &HistoryRequest<'_>,
        side: PriceSide,
    ) -> Result<Vec<PricePoint>, DataError> {
        if !(self.start_price > 0.0 && self.spread >= 0.0 && self.volatility >= 0.0) {
            return Err(DataError::Invalid(
                "synthetic source needs positive price and non-negative spread/volatility".into(),
            ));
        }
        let offset = match side {
            PriceSide::Bid => 0.0,
            PriceSide::Ask => self.spread,
            PriceSide::Mid => self.spread / 2.0,
        };
        Ok(self
            .walk(request)
            .into_iter()
            .map(|(timestamp, bid)| PricePoint {
                timestamp,
                price: bid + offset,
            })
            .collect())
    }
}

/// Bars ready for a backtest, with provenance.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub bars: Vec<Bar>,
    pub source: String,
    pub dataset_hash: DatasetHash,
    pub synthetic: bool,
}

const DEFAULT_SYNTHETIC_BARS: i32 = 1000;

fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn fetch(
    source: &dyn MarketDataSource,
    instrument: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
) -> Result<Vec<Bar>, LoadError> {
    let request = HistoryRequest {
        instrument,
        start,
        end,
        granularity,
    };
    Ok(fetch_bars(source, &request)?)
}

/// Resolve the `[backtest]` section to bars: the CSV when `data` is set,
/// the synthetic walk otherwise.
pub fn load_bars(backtest: &BacktestSection) -> Result<LoadedBars, LoadError> {
    let instrument = backtest.instrument.as_str();
    let (bars, source, synthetic) = match &backtest.data {
        Some(path) => {
            let source = CsvQuoteSource::open(path)?;
            let start = backtest
                .start
                .or(source.first_timestamp())
                .ok_or_else(|| LoadError::Empty { path: path.clone() })?;
            let end = backtest
                .end
                .or(source.last_timestamp())
                .ok_or_else(|| LoadError::Empty { path: path.clone() })?;
            let bars = fetch(&source, instrument, start, end, backtest.granularity)?;
            (bars, source.name().to_string(), false)
        }
        None => {
            warn!(instrument, "no data file configured, using synthetic quotes");
            let source = SyntheticSource::default();
            let start = backtest.start.unwrap_or_else(default_start);
            let end = backtest
                .end
                .unwrap_or(start + backtest.granularity.duration() * DEFAULT_SYNTHETIC_BARS);
            let bars = fetch(&source, instrument, start, end, backtest.granularity)?;
            (bars, source.name().to_string(), true)
        }
    };

    let dataset_hash = DatasetHash::of(&bars);
    info!(
        instrument,
        source = %source,
        bars = bars.len(),
        dataset = %dataset_hash,
        "bars loaded"
    );
    Ok(LoadedBars {
        bars,
        source,
        dataset_hash,
        synthetic,
    })
}
