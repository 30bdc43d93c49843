//! Parameter sweep over the (n, m, l) grid.
//!
//! Every combination runs the full single-threaded pipeline against the shared
//! `MarketContext` on a dedicated rayon pool. A task that errors or panics
//! becomes a failed row; the sweep always completes.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bandrev_core::signals::SignalParams;

use crate::data_loader::MarketContext;
use crate::runner::{run_strategy, RunError, RunOutput, RunSettings};

/// Decimal places float grid values are rounded to.
const GRID_DECIMALS: i32 = 10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("{name}: step must be positive, got {step}")]
    Step { name: &'static str, step: f64 },
    #[error("{name}: range values must be finite")]
    NotFinite { name: &'static str },
    #[error("{name}: range is empty ({start}..{stop})")]
    Empty { name: &'static str, start: f64, stop: f64 },
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to build sweep thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

// ─── Ranges ─────────────────────────────────────────────────────────

/// Integer range, stop exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub start: usize,
    pub stop: usize,
    pub step: usize,
}

impl IntRange {
    pub fn values(&self) -> Vec<usize> {
        if self.step == 0 {
            return Vec::new();
        }
        (self.start..self.stop).step_by(self.step).collect()
    }

    fn validate(&self, name: &'static str) -> Result<(), GridError> {
        if self.step == 0 {
            return Err(GridError::Step { name, step: 0.0 });
        }
        if self.start >= self.stop {
            return Err(GridError::Empty {
                name,
                start: self.start as f64,
                stop: self.stop as f64,
            });
        }
        Ok(())
    }
}

/// Float range, stop exclusive. Values are `start + k * step`, rounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl FloatRange {
    pub fn values(&self) -> Vec<f64> {
        if !(self.step > 0.0) || !self.start.is_finite() || !self.stop.is_finite() {
            return Vec::new();
        }
        let count = ((self.stop - self.start) / self.step).ceil().max(0.0) as usize;
        (0..count)
            .map(|k| round_to(self.start + k as f64 * self.step, GRID_DECIMALS))
            .filter(|&v| v < self.stop)
            .collect()
    }

    fn validate(&self, name: &'static str) -> Result<(), GridError> {
        if ![self.start, self.stop, self.step].iter().all(|v| v.is_finite()) {
            return Err(GridError::NotFinite { name });
        }
        if self.step <= 0.0 {
            return Err(GridError::Step {
                name,
                step: self.step,
            });
        }
        if self.start >= self.stop {
            return Err(GridError::Empty {
                name,
                start: self.start,
                stop: self.stop,
            });
        }
        Ok(())
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

// ─── Grid ───────────────────────────────────────────────────────────

/// Cartesian grid over window length, band multiplier and deviation threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub n: IntRange,
    pub m: FloatRange,
    pub l: FloatRange,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n: IntRange {
                start: 300,
                stop: 600,
                step: 10,
            },
            m: FloatRange {
                start: 1.0,
                stop: 5.0,
                step: 0.1,
            },
            l: FloatRange {
                start: 0.01,
                stop: 0.10,
                step: 0.01,
            },
        }
    }
}

impl ParamGrid {
    pub fn validate(&self) -> Result<(), GridError> {
        self.n.validate("n")?;
        self.m.validate("m")?;
        self.l.validate("l")
    }

    /// Number of combinations.
    pub fn size(&self) -> usize {
        self.n.values().len() * self.m.values().len() * self.l.values().len()
    }

    /// All combinations, n-major, then m, then l.
    ///
    /// Combinations are not validated here; an invalid one becomes a failed
    /// row when it runs.
    pub fn combinations(&self) -> Vec<(usize, f64, f64)> {
        let (ns, ms, ls) = (self.n.values(), self.m.values(), self.l.values());
        let mut out = Vec::with_capacity(ns.len() * ms.len() * ls.len());
        for &n in &ns {
            for &m in &ms {
                for &l in &ls {
                    out.push((n, m, l));
                }
            }
        }
        out
    }
}

// ─── Rows ───────────────────────────────────────────────────────────

/// One sweep result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub n: usize,
    pub m: f64,
    pub l: f64,
    /// Final equity-curve value; `None` when the task failed.
    pub equity_curve: Option<f64>,
    pub error: Option<String>,
}

impl SweepRow {
    pub fn is_failed(&self) -> bool {
        self.equity_curve.is_none()
    }
}

/// Successful rows by final equity descending, then failed rows.
///
/// Ties (and failed rows) keep grid order.
pub fn sort_rows(rows: &mut [SweepRow]) {
    rows.sort_by(|a, b| match (a.equity_curve, b.equity_curve) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

// ─── Execution ──────────────────────────────────────────────────────

/// Log progress every this many completed tasks.
const PROGRESS_EVERY: usize = 100;

/// Run one combination, turning errors and panics into a failed row.
pub fn run_combination(
    ctx: &MarketContext,
    (n, m, l): (usize, f64, f64),
    settings: &RunSettings,
) -> SweepRow {
    isolate((n, m, l), || {
        let params = SignalParams::new(n, m, l)?;
        run_strategy(ctx.bars(), &params, settings)
    })
}

/// Run `task` for one combination; an error or a panic becomes a failed row.
fn isolate<F>((n, m, l): (usize, f64, f64), task: F) -> SweepRow
where
    F: FnOnce() -> Result<RunOutput, RunError>,
{
    let (equity_curve, error) = match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(output)) => (Some(output.simulation.final_equity()), None),
        Ok(Err(e)) => (None, Some(e.to_string())),
        Err(payload) => (None, Some(panic_message(payload.as_ref()))),
    };

    if let Some(reason) = &error {
        tracing::warn!(n, m, l, reason = %reason, "combination failed");
    }

    SweepRow {
        n,
        m,
        l,
        equity_curve,
        error,
    }
}

/// Run the whole grid on a pool of `workers` threads and return sorted rows.
///
/// The result is independent of `workers` and of scheduling.
pub fn run_sweep(
    ctx: &MarketContext,
    grid: &ParamGrid,
    settings: &RunSettings,
    workers: usize,
) -> Result<Vec<SweepRow>, SweepError> {
    let combos = grid.combinations();
    let total = combos.len();
    let done = AtomicUsize::new(0);

    tracing::info!(
        combinations = total,
        workers,
        bars = ctx.len(),
        dataset = %ctx.dataset_hash,
        "starting sweep"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;

    let mut rows: Vec<SweepRow> = pool.install(|| {
        combos
            .par_iter()
            .map(|&combo| {
                let row = run_combination(ctx, combo, settings);
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % PROGRESS_EVERY == 0 || finished == total {
                    tracing::info!(finished, total, "sweep progress");
                }
                row
            })
            .collect()
    });

    sort_rows(&mut rows);

    let failed = rows.iter().filter(|r| r.is_failed()).count();
    tracing::info!(total, failed, "sweep finished");
    Ok(rows)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::generate_synthetic_bars;
    use chrono::{Duration, NaiveDate};

    fn small_grid() -> ParamGrid {
        ParamGrid {
            n: IntRange {
                start: 10,
                stop: 40,
                step: 10,
            },
            m: FloatRange {
                start: 1.0,
                stop: 2.0,
                step: 0.5,
            },
            l: FloatRange {
                start: 0.01,
                stop: 0.03,
                step: 0.01,
            },
        }
    }

    fn context() -> MarketContext {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = generate_synthetic_bars("sweep", start, 2_000, Duration::minutes(15));
        MarketContext::new(bars, true)
    }

    #[test]
    fn default_grid_matches_reference_ranges() {
        let grid = ParamGrid::default();
        assert_eq!(grid.n.values().len(), 30);
        assert_eq!(grid.m.values().len(), 40);
        assert_eq!(grid.l.values().len(), 9);
        assert_eq!(grid.size(), 30 * 40 * 9);
        assert_eq!(grid.m.values()[3], 1.3);
        assert_eq!(*grid.l.values().last().unwrap(), 0.09);
    }

    #[test]
    fn float_range_is_stop_exclusive() {
        let r = FloatRange {
            start: 0.1,
            stop: 0.4,
            step: 0.1,
        };
        assert_eq!(r.values(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn combinations_are_n_major() {
        let combos = small_grid().combinations();
        assert_eq!(combos.len(), 3 * 2 * 2);
        assert_eq!(combos[0], (10, 1.0, 0.01));
        assert_eq!(combos[1], (10, 1.0, 0.02));
        assert_eq!(combos[2], (10, 1.5, 0.01));
        assert_eq!(combos[4], (20, 1.0, 0.01));
    }

    #[test]
    fn grid_validation_rejects_bad_ranges() {
        let mut grid = small_grid();
        grid.m.step = 0.0;
        assert!(matches!(grid.validate(), Err(GridError::Step { name: "m", .. })));

        let mut grid = small_grid();
        grid.n.stop = 5;
        assert!(matches!(grid.validate(), Err(GridError::Empty { name: "n", .. })));
    }

    #[test]
    fn failed_rows_sort_last() {
        let row = |eq: Option<f64>| SweepRow {
            n: 1,
            m: 1.0,
            l: 0.1,
            equity_curve: eq,
            error: eq.is_none().then(|| "boom".to_string()),
        };
        let mut rows = vec![row(Some(1.1)), row(None), row(Some(2.0)), row(Some(0.5))];
        sort_rows(&mut rows);
        let eqs: Vec<Option<f64>> = rows.iter().map(|r| r.equity_curve).collect();
        assert_eq!(eqs, vec![Some(2.0), Some(1.1), Some(0.5), None]);
    }

    #[test]
    fn invalid_combination_becomes_failed_row() {
        let ctx = context();
        let row = run_combination(&ctx, (0, 1.0, 0.05), &RunSettings::default());
        assert!(row.is_failed());
        assert!(row.error.unwrap().contains("window"));
    }

    #[test]
    fn panic_with_static_message_becomes_failed_row() {
        let row = isolate((300, 2.0, 0.05), || -> Result<RunOutput, RunError> {
            panic!("band state corrupted")
        });
        assert!(row.is_failed());
        assert_eq!(row.equity_curve, None);
        assert_eq!(row.error.as_deref(), Some("panicked: band state corrupted"));
        assert_eq!((row.n, row.m, row.l), (300, 2.0, 0.05));
    }

    #[test]
    fn panic_with_formatted_message_becomes_failed_row() {
        let row = isolate((310, 2.5, 0.02), || -> Result<RunOutput, RunError> {
            let bar = 17;
            panic!("index {bar} out of range")
        });
        assert!(row.is_failed());
        let reason = row.error.unwrap();
        assert!(reason.starts_with("panicked:"));
        assert!(reason.contains("index 17 out of range"));
    }

    #[test]
    fn panic_with_opaque_payload_still_fails_row() {
        let row = isolate((320, 1.0, 0.01), || -> Result<RunOutput, RunError> {
            std::panic::panic_any(42_u32)
        });
        assert_eq!(row.error.as_deref(), Some("panicked"));
    }

    #[test]
    fn panicking_task_does_not_stop_neighbours() {
        let ctx = context();
        let settings = RunSettings::default();
        let rows: Vec<SweepRow> = [(10, 1.0, 0.01), (20, 1.0, 0.01)]
            .into_iter()
            .map(|(n, m, l)| {
                if n == 10 {
                    isolate((n, m, l), || -> Result<RunOutput, RunError> {
                        panic!("boom")
                    })
                } else {
                    run_combination(&ctx, (n, m, l), &settings)
                }
            })
            .collect();
        assert!(rows[0].is_failed());
        assert!(rows[1]
            .error
            .as_deref()
            .map_or(true, |e| !e.starts_with("panicked")));
    }

    #[test]
    fn sweep_is_independent_of_worker_count() {
        let ctx = context();
        let settings = RunSettings::default();
        let sequential = run_sweep(&ctx, &small_grid(), &settings, 1).unwrap();
        let parallel = run_sweep(&ctx, &small_grid(), &settings, 4).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.len(), 12);
    }
}
