//! Candle loading and the shared market context.
//!
//! Loading policy:
//! 1. `--synthetic` → seeded random-walk bars (tagged as synthetic)
//! 2. otherwise the CSV at `[data] path` is read and cleaned
//! 3. a missing, unreadable, malformed or empty file is a fatal `LoadError`
//!
//! The cleaned series is frozen into a `MarketContext` and shared read-only by
//! every sweep task.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use bandrev_core::data::{clean_bars, CleanError, CleanOptions};
use bandrev_core::domain::Bar;

/// Timestamp layouts accepted in `candle_begin_time`.
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no candle file configured (set [data] path or use --synthetic)")]
    NoPath,

    #[error("failed to open candle file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed candle data: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("candle file contains no rows")]
    Empty,

    #[error("cleaning failed: {0}")]
    Clean(#[from] CleanError),
}

/// One CSV row as stored on disk.
#[derive(Debug, Deserialize)]
struct CandleRecord {
    candle_begin_time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub path: Option<PathBuf>,
    pub clean: CleanOptions,
    /// Generate synthetic bars instead of reading a file.
    pub synthetic: bool,
    /// Number of synthetic bars.
    pub synthetic_bars: usize,
    /// First synthetic timestamp.
    pub synthetic_start: NaiveDateTime,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            path: None,
            clean: CleanOptions::default(),
            synthetic: false,
            synthetic_bars: 35_040,
            synthetic_start: chrono::NaiveDate::from_ymd_opt(2021, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
        }
    }
}

/// Immutable price series shared by every run.
#[derive(Debug, Clone)]
pub struct MarketContext {
    bars: Arc<[Bar]>,
    /// BLAKE3 over every bar, for run provenance.
    pub dataset_hash: String,
    pub synthetic: bool,
}

impl MarketContext {
    pub fn new(bars: Vec<Bar>, synthetic: bool) -> Self {
        let dataset_hash = compute_dataset_hash(&bars);
        Self {
            bars: bars.into(),
            dataset_hash,
            synthetic,
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Resolve, read and clean the configured series.
pub fn load_market(opts: &LoadOptions) -> Result<MarketContext, LoadError> {
    if opts.synthetic {
        tracing::warn!(
            bars = opts.synthetic_bars,
            "generating synthetic data; results are tagged as synthetic"
        );
        let bars = generate_synthetic_bars(
            "bandrev",
            opts.synthetic_start,
            opts.synthetic_bars,
            opts.clean.interval,
        );
        return Ok(MarketContext::new(bars, true));
    }

    let path = opts.path.as_deref().ok_or(LoadError::NoPath)?;
    let raw = read_candles(path)?;
    let bars = clean_bars(&raw, &opts.clean)?;
    let ctx = MarketContext::new(bars, false);

    tracing::info!(
        path = %path.display(),
        raw = raw.len(),
        bars = ctx.len(),
        dataset = %ctx.dataset_hash,
        "loaded candles"
    );
    Ok(ctx)
}

/// Read raw candles from a CSV file.
pub fn read_candles(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_candles_from(file)
}

/// Read raw candles from any CSV source with a
/// `candle_begin_time,open,high,low,close,volume` header.
pub fn read_candles_from<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();

    for (i, record) in rdr.deserialize::<CandleRecord>().enumerate() {
        let record = record?;
        let timestamp = parse_timestamp(&record.candle_begin_time).ok_or_else(|| {
            LoadError::Timestamp {
                row: i + 1,
                value: record.candle_begin_time.clone(),
            }
        })?;
        bars.push(Bar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }

    if bars.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(bars)
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Deterministic BLAKE3 hash over timestamps and OHLCV values.
fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate a seeded random walk of `count` bars spaced by `interval`.
///
/// The seed is derived from `label`, so the same label always produces the
/// same series.
pub fn generate_synthetic_bars(
    label: &str,
    start: NaiveDateTime,
    count: usize,
    interval: Duration,
) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(label.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut price = 30_000.0_f64;
    (0..count)
        .map(|i| {
            let step: f64 = rng.gen_range(-0.004..0.004);
            let open = price;
            let close = price * (1.0 + step);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.002));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.002));
            let volume = rng.gen_range(10.0..500.0);
            price = close;
            Bar {
                timestamp: start + interval * i as i32,
                open,
                high,
                low,
                close,
                volume,
            }
        })
        .collect()
}
