//! Trade — one maximal run of non-flat position, regrouped from simulated bars.

use super::direction::Direction;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A completed position run.
///
/// `entry_price` and `exit_price` are the raw bar prices (first open, last close)
/// of the run, not the slippage-adjusted fills; the fills live on the per-bar
/// account state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Identification ──
    /// Timestamp of the entry bar; doubles as the run id.
    pub start: NaiveDateTime,
    /// Timestamp of the last non-flat bar.
    pub end: NaiveDateTime,
    pub direction: Direction,
    pub leverage: Option<f64>,

    // ── Prices ──
    pub entry_price: f64,
    pub exit_price: f64,

    // ── Outcome ──
    pub bar_count: usize,
    /// Product of (1 + bar return) over the run, minus 1.
    pub change: f64,
    pub end_equity: f64,
    pub min_equity: f64,
}

impl Trade {
    /// Time between the entry bar and the last bar of the run.
    pub fn holding_duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_winner(&self) -> bool {
        self.change > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.change < 0.0
    }
}
