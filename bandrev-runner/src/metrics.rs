//! Performance statistics — pure functions over the equity curve and trades.
//!
//! Every metric is a pure function: equity curve (with timestamps) and/or the
//! trade list in, value out. `PerformanceReport::compute` bundles them.

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bandrev_core::domain::Trade;
use bandrev_core::engine::Simulation;

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("no trades: statistics are undefined")]
    NoTrades,
    #[error("insufficient history: need at least two bars spanning a positive time ({bars} bars)")]
    InsufficientHistory { bars: usize },
}

/// Summary statistics for one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    // ── Equity curve ──
    pub cumulative_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub drawdown_start: NaiveDateTime,
    pub drawdown_end: NaiveDateTime,
    /// |annualized / max drawdown|; `None` without a drawdown.
    pub return_drawdown_ratio: Option<f64>,

    // ── Trades ──
    pub trade_count: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub win_rate: f64,
    pub mean_trade_return: f64,
    pub profit_factor: Option<f64>,
    pub max_trade_return: f64,
    pub min_trade_return: f64,
    pub holding: HoldingStats,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub liquidations: usize,

    pub monthly_returns: Vec<MonthlyReturn>,
}

impl PerformanceReport {
    pub fn compute(sim: &Simulation, trades: &[Trade]) -> Result<Self, StatsError> {
        if trades.is_empty() {
            return Err(StatsError::NoTrades);
        }
        let equity = sim.equity_curve();
        let timestamps = sim.timestamps();

        let annualized = annualized_return(&equity, &timestamps)?;
        let drawdown = max_drawdown(&equity, &timestamps)
            .ok_or(StatsError::InsufficientHistory { bars: equity.len() })?;
        let holding = holding_stats(trades).ok_or(StatsError::NoTrades)?;
        let (win_count, loss_count) = win_loss_counts(trades);
        let changes: Vec<f64> = trades.iter().map(|t| t.change).collect();

        Ok(Self {
            cumulative_return: cumulative_return(&equity),
            annualized_return: annualized,
            max_drawdown: drawdown.value,
            drawdown_start: drawdown.start,
            drawdown_end: drawdown.end,
            return_drawdown_ratio: return_drawdown_ratio(annualized, drawdown.value),
            trade_count: trades.len(),
            win_count,
            loss_count,
            win_rate: win_count as f64 / trades.len() as f64,
            mean_trade_return: mean(&changes),
            profit_factor: profit_factor(trades),
            max_trade_return: changes.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min_trade_return: changes.iter().copied().fold(f64::INFINITY, f64::min),
            holding,
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            liquidations: sim.liquidation_count(),
            monthly_returns: monthly_returns(&timestamps, &sim.returns()),
        })
    }
}

// ─── Equity-curve metrics ───────────────────────────────────────────

/// Final equity over initial equity; 0.0 for an empty or zero-based curve.
pub fn cumulative_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => last / first,
        _ => 0.0,
    }
}

/// Compound annual growth over the wall-clock span of the curve (365-day year).
pub fn annualized_return(
    equity: &[f64],
    timestamps: &[NaiveDateTime],
) -> Result<f64, StatsError> {
    let bars = equity.len().min(timestamps.len());
    if bars < 2 {
        return Err(StatsError::InsufficientHistory { bars });
    }
    let span = (timestamps[bars - 1] - timestamps[0]).num_seconds() as f64;
    if span <= 0.0 {
        return Err(StatsError::InsufficientHistory { bars });
    }
    let years = span / SECONDS_PER_DAY / DAYS_PER_YEAR;
    Ok(cumulative_return(&equity[..bars]).powf(1.0 / years) - 1.0)
}

/// Deepest peak-to-trough decline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    /// Negative fraction, e.g. -0.25. Zero for a curve that never declines.
    pub value: f64,
    /// Most recent bar at or before the trough sitting at the running peak.
    pub start: NaiveDateTime,
    /// First bar reaching the deepest drawdown.
    pub end: NaiveDateTime,
}

pub fn max_drawdown(equity: &[f64], timestamps: &[NaiveDateTime]) -> Option<Drawdown> {
    let bars = equity.len().min(timestamps.len());
    if bars == 0 {
        return None;
    }

    let mut peak = equity[0];
    let mut peak_idx = 0;
    let mut worst = 0.0_f64;
    let (mut start, mut end) = (0, 0);

    for (i, &eq) in equity[..bars].iter().enumerate() {
        if eq >= peak {
            peak = eq;
            peak_idx = i;
        }
        let dd = if peak > 0.0 { eq / peak - 1.0 } else { 0.0 };
        if dd < worst {
            worst = dd;
            start = peak_idx;
            end = i;
        }
    }

    Some(Drawdown {
        value: worst,
        start: timestamps[start],
        end: timestamps[end],
    })
}

pub fn return_drawdown_ratio(annualized: f64, max_drawdown: f64) -> Option<f64> {
    (max_drawdown != 0.0).then(|| (annualized / max_drawdown).abs())
}

/// Compounded return of one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub value: f64,
}

/// Per-bar returns compounded per calendar month, first to last bar.
///
/// Months without bars report 0.
pub fn monthly_returns(timestamps: &[NaiveDateTime], returns: &[f64]) -> Vec<MonthlyReturn> {
    let bars = timestamps.len().min(returns.len());
    if bars == 0 {
        return Vec::new();
    }

    let month_of = |ts: &NaiveDateTime| (ts.year(), ts.month());
    let mut out: Vec<MonthlyReturn> = Vec::new();
    let (mut year, mut month) = month_of(&timestamps[0]);
    let mut growth = 1.0;

    for (ts, r) in timestamps[..bars].iter().zip(returns) {
        let (y, m) = month_of(ts);
        while (year, month) != (y, m) {
            out.push(MonthlyReturn {
                year,
                month,
                value: growth - 1.0,
            });
            growth = 1.0;
            (year, month) = next_month(year, month);
        }
        growth *= 1.0 + r;
    }
    out.push(MonthlyReturn {
        year,
        month,
        value: growth - 1.0,
    });
    out
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

// ─── Trade metrics ──────────────────────────────────────────────────

/// (wins, losses): a trade with zero return counts as a loss.
pub fn win_loss_counts(trades: &[Trade]) -> (usize, usize) {
    let wins = trades.iter().filter(|t| t.is_winner()).count();
    (wins, trades.len() - wins)
}

/// Mean winning return over the magnitude of the mean losing return.
///
/// Zero-return trades are excluded from both sides. `None` when either side
/// is empty.
pub fn profit_factor(trades: &[Trade]) -> Option<f64> {
    let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.change).collect();
    let losses: Vec<f64> = trades.iter().filter(|t| t.is_loser()).map(|t| t.change).collect();
    if wins.is_empty() || losses.is_empty() {
        return None;
    }
    Some(mean(&wins) / mean(&losses).abs())
}

/// Longest run of consecutive trades with positive return.
pub fn max_consecutive_wins(trades: &[Trade]) -> usize {
    longest_streak(trades, Trade::is_winner)
}

/// Longest run of consecutive trades with negative return.
pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    longest_streak(trades, Trade::is_loser)
}

fn longest_streak(trades: &[Trade], pred: impl Fn(&Trade) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for trade in trades {
        if pred(trade) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// A duration split into whole days, hours and minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingSpan {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl HoldingSpan {
    pub fn from_duration(d: Duration) -> Self {
        let secs = d.num_seconds();
        let rem = secs.rem_euclid(86_400);
        Self {
            days: secs.div_euclid(86_400),
            hours: rem / 3_600,
            minutes: rem % 3_600 / 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingStats {
    pub max: HoldingSpan,
    pub min: HoldingSpan,
    pub mean: HoldingSpan,
}

pub fn holding_stats(trades: &[Trade]) -> Option<HoldingStats> {
    let durations: Vec<Duration> = trades.iter().map(Trade::holding_duration).collect();
    let max = *durations.iter().max()?;
    let min = *durations.iter().min()?;
    let total: i64 = durations.iter().map(|d| d.num_seconds()).sum();
    let mean = Duration::seconds(total / durations.len() as i64);
    Some(HoldingStats {
        max: HoldingSpan::from_duration(max),
        min: HoldingSpan::from_duration(min),
        mean: HoldingSpan::from_duration(mean),
    })
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
