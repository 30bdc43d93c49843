//! Data layer: candle cleaning ahead of the signal pipeline.

pub mod canonicalize;

pub use canonicalize::{clean_bars, CleanError, CleanOptions};
