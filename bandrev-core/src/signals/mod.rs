//! Signal generation.
//!
//! A signal is a per-bar [`Direction`]; it says what the strategy wants to hold
//! after the bar closes. Positions are derived from signals one bar later by
//! [`crate::engine::resolve_positions`].

pub mod band_reversion;

pub use band_reversion::{generate_signals, BandReversion, SignalParams};

use crate::domain::Direction;

/// Per-bar signal value.
pub type Signal = Direction;
