//! Position resolution — signal lagged one bar, with a settlement blackout.
//!
//! The position held during bar t is the signal produced at the close of bar
//! t-1; bar 0 is always flat. Bars stamped exactly at the daily settlement time
//! cannot change position and keep the previous bar's position.

use crate::domain::{Bar, Direction};
use chrono::Timelike;
use serde::{Deserialize, Serialize};

/// Per-bar held position.
pub type Position = Direction;

/// Daily time at which the exchange settles and no position change is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blackout {
    pub hour: u32,
    pub minute: u32,
}

impl Default for Blackout {
    fn default() -> Self {
        Self { hour: 16, minute: 0 }
    }
}

impl Blackout {
    pub fn covers(&self, bar: &Bar) -> bool {
        bar.timestamp.hour() == self.hour && bar.timestamp.minute() == self.minute
    }
}

/// Shift signals by one bar and apply the blackout.
///
/// Both slices are read up to the shorter length.
pub fn resolve_positions(
    bars: &[Bar],
    signals: &[Direction],
    blackout: Option<Blackout>,
) -> Vec<Position> {
    let len = bars.len().min(signals.len());
    let mut positions = Vec::with_capacity(len);
    let mut prev = Direction::Flat;

    for (i, bar) in bars[..len].iter().enumerate() {
        let lagged = if i == 0 {
            Direction::Flat
        } else {
            signals[i - 1]
        };
        let pos = match blackout {
            Some(b) if b.covers(bar) => prev,
            _ => lagged,
        };
        positions.push(pos);
        prev = pos;
    }
    positions
}
