//! Candle cleaning: sort, dedupe, resample, filter.
//!
//! Raw candles may arrive out of order, with repeated timestamps, or at a finer
//! interval than the strategy trades on. `clean_bars` turns them into a strictly
//! increasing series on the target interval.

use crate::domain::Bar;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CleanError {
    #[error("no bars left after cleaning")]
    Empty,
    #[error("resample interval must be positive, got {0} seconds")]
    InvalidInterval(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOptions {
    /// Target bar interval. Buckets are aligned to midnight of the first bar's day.
    pub interval: Duration,
    /// Bars before this timestamp are dropped.
    pub start: Option<NaiveDateTime>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            interval: Duration::minutes(15),
            start: None,
        }
    }
}

/// Clean raw candles into the series the pipeline consumes.
///
/// 1. stable sort by timestamp, keep the first of each duplicate
/// 2. resample into left-closed, left-labelled buckets of `interval`
/// 3. drop zero-volume bars and bars before `start`
pub fn clean_bars(raw: &[Bar], opts: &CleanOptions) -> Result<Vec<Bar>, CleanError> {
    let secs = opts.interval.num_seconds();
    if secs <= 0 {
        return Err(CleanError::InvalidInterval(secs));
    }
    if raw.is_empty() {
        return Err(CleanError::Empty);
    }

    let mut sorted = raw.to_vec();
    sorted.sort_by_key(|b| b.timestamp);
    sorted.dedup_by_key(|b| b.timestamp);

    let cleaned: Vec<Bar> = resample(&sorted, secs)
        .into_iter()
        .filter(|b| b.volume > 0.0)
        .filter(|b| opts.start.map_or(true, |s| b.timestamp >= s))
        .collect();

    tracing::debug!(raw = raw.len(), cleaned = cleaned.len(), "cleaned bars");

    if cleaned.is_empty() {
        return Err(CleanError::Empty);
    }
    Ok(cleaned)
}

fn bucket_start(ts: NaiveDateTime, origin: NaiveDateTime, secs: i64) -> NaiveDateTime {
    let offset = (ts - origin).num_seconds().rem_euclid(secs);
    ts - Duration::seconds(offset)
}

/// Aggregate sorted bars into interval buckets. Empty buckets are skipped.
fn resample(sorted: &[Bar], secs: i64) -> Vec<Bar> {
    let Some(first) = sorted.first() else {
        return Vec::new();
    };
    let origin = first.timestamp.date().and_time(NaiveTime::default());

    let mut out: Vec<Bar> = Vec::new();
    for bar in sorted {
        let label = bucket_start(bar.timestamp, origin, secs);
        match out.last_mut() {
            Some(acc) if acc.timestamp == label => {
                acc.high = acc.high.max(bar.high);
                acc.low = acc.low.min(bar.low);
                acc.close = bar.close;
                acc.volume += bar.volume;
            }
            _ => out.push(Bar {
                timestamp: label,
                ..*bar
            }),
        }
    }
    out
}
