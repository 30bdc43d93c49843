//! BandRev Core — bars, band signals, positions, futures equity simulation.
//!
//! This crate contains the sequential per-bar pipeline:
//! - Domain types (bars, directions, trades)
//! - Expanding/rolling Bollinger bands computed in a single streaming pass
//! - Mean-reversion band signal with crossing hysteresis
//! - Lagged position resolution with a daily settlement blackout
//! - Leveraged futures equity simulator (margin, fees, slippage, liquidation)
//! - Trade extraction from the simulated bars
//! - Candle cleaning (sort, de-duplicate, resample, filter)

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod signals;

pub use error::ParamError;
