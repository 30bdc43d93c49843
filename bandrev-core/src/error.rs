//! Parameter validation errors shared by the signal and engine layers.

use thiserror::Error;

/// A strategy or contract parameter outside its domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("window length n must be >= 1 (got {0})")]
    WindowLength(usize),

    #[error("band multiplier m must be positive and finite (got {0})")]
    BandMultiplier(f64),

    #[error("deviation threshold l must lie in (0, 1) (got {0})")]
    DeviationThreshold(f64),

    #[error("contract field '{field}' is out of range: {value}")]
    Contract { field: &'static str, value: f64 },
}
