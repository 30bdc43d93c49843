//! Per-bar account state and the simulation result container.

use crate::domain::{Bar, Direction};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Account snapshot for one bar of a position run.
///
/// `None` marks an undefined value (division by zero, missing price) that the
/// column fill policy could not resolve. Exit fields are only set on the exit
/// bar of the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    // ── Entry terms (constant for the run) ──
    pub entry_time: NaiveDateTime,
    pub contracts: Option<f64>,
    pub entry_price: Option<f64>,
    pub entry_fee: Option<f64>,
    /// Cash after the entry fee, and after the exit fee on the exit bar.
    pub cash: Option<f64>,

    // ── Exit ──
    pub exit_price: Option<f64>,
    pub exit_fee: Option<f64>,

    // ── Marking ──
    pub profit: Option<f64>,
    pub worst_price: Option<f64>,
    pub worst_profit: Option<f64>,
    pub net_value: Option<f64>,
    pub worst_net_value: Option<f64>,
    pub margin_ratio: Option<f64>,
    pub liquidated: bool,
}

/// One bar after simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedBar {
    pub bar: Bar,
    pub position: Direction,
    /// `None` while flat.
    pub account: Option<AccountState>,
    pub bar_return: f64,
    pub equity: f64,
}

impl SimulatedBar {
    pub fn timestamp(&self) -> NaiveDateTime {
        self.bar.timestamp
    }

    pub fn is_entry(&self) -> bool {
        self.account
            .map(|a| a.entry_time == self.bar.timestamp)
            .unwrap_or(false)
    }
}

/// Full per-bar simulation output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Simulation {
    pub bars: Vec<SimulatedBar>,
}

impl Simulation {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn equity_curve(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.equity).collect()
    }

    pub fn returns(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.bar_return).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.bar.timestamp).collect()
    }

    /// Final equity-curve value; 1.0 for an empty history.
    pub fn final_equity(&self) -> f64 {
        self.bars.last().map(|b| b.equity).unwrap_or(1.0)
    }

    /// Number of runs that hit forced liquidation.
    pub fn liquidation_count(&self) -> usize {
        let mut count = 0;
        let mut prev: Option<(NaiveDateTime, bool)> = None;
        for b in &self.bars {
            let current = b.account.map(|a| (a.entry_time, a.liquidated));
            if let Some((entry, true)) = current {
                let already = matches!(prev, Some((e, true)) if e == entry);
                if !already {
                    count += 1;
                }
            }
            prev = current;
        }
        count
    }
}
