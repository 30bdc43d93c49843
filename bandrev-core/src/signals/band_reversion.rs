//! Band mean-reversion signal.
//!
//! A raw three-state signal is driven by four crossing events, each comparing
//! the current bar against the previous bar:
//!
//! | event | condition | raw |
//! |---|---|---|
//! | upper breakout | close > upper, prev close <= prev upper | long |
//! | mean break down | close < mean, prev close >= prev mean | flat |
//! | lower breakout | close < lower, prev close >= prev lower | short |
//! | mean break up | close > mean, prev close <= prev mean | flat |
//!
//! When two events fire on the same bar the later row wins. Without an event the
//! raw signal carries forward (flat at the start of history).
//!
//! The emitted signal only enters when close is within `l` of the mean on the
//! breakout side; it goes flat whenever the raw signal is flat and otherwise
//! holds its previous value.

use crate::domain::{Bar, Direction};
use crate::error::ParamError;
use crate::indicators::{Band, RollingBands};
use serde::{Deserialize, Serialize};

/// Indicator parameters for one strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalParams {
    /// Rolling window length.
    pub n: usize,
    /// Band width multiplier.
    pub m: f64,
    /// Maximum fractional deviation of close from the mean for an entry.
    pub l: f64,
}

impl SignalParams {
    pub fn new(n: usize, m: f64, l: f64) -> Result<Self, ParamError> {
        let params = Self { n, m, l };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.n < 1 {
            return Err(ParamError::WindowLength(self.n));
        }
        if !(self.m > 0.0 && self.m.is_finite()) {
            return Err(ParamError::BandMultiplier(self.m));
        }
        if !(self.l > 0.0 && self.l < 1.0) {
            return Err(ParamError::DeviationThreshold(self.l));
        }
        Ok(())
    }
}

/// Streaming signal state machine.
#[derive(Debug, Clone)]
pub struct BandReversion {
    params: SignalParams,
    bands: RollingBands,
    prev: Option<(f64, Band)>,
    raw: Direction,
    signal: Direction,
}

impl BandReversion {
    pub fn new(params: SignalParams) -> Result<Self, ParamError> {
        params.validate()?;
        Ok(Self {
            params,
            bands: RollingBands::new(params.n, params.m),
            prev: None,
            raw: Direction::Flat,
            signal: Direction::Flat,
        })
    }

    /// Feed the next close and return the signal for this bar.
    pub fn on_close(&mut self, close: f64) -> Direction {
        let band = self.bands.push(close);

        if let Some((prev_close, prev_band)) = self.prev {
            if let Some(raw) = crossing(close, &band, prev_close, &prev_band) {
                self.raw = raw;
            }
        }
        self.prev = Some((close, band));

        let deviation = (close - band.mean) / band.mean;
        let l = self.params.l;
        self.signal = match self.raw {
            Direction::Long if deviation > 0.0 && deviation <= l => Direction::Long,
            Direction::Short if deviation >= -l && deviation < 0.0 => Direction::Short,
            Direction::Flat => Direction::Flat,
            _ => self.signal,
        };
        self.signal
    }
}

/// The crossing event for a bar, if any. Later events override earlier ones.
fn crossing(close: f64, band: &Band, prev_close: f64, prev: &Band) -> Option<Direction> {
    let mut event = None;
    if close > band.upper && prev_close <= prev.upper {
        event = Some(Direction::Long);
    }
    if close < band.mean && prev_close >= prev.mean {
        event = Some(Direction::Flat);
    }
    if close < band.lower && prev_close >= prev.lower {
        event = Some(Direction::Short);
    }
    if close > band.mean && prev_close <= prev.mean {
        event = Some(Direction::Flat);
    }
    event
}

/// Compute the signal series for a bar slice.
pub fn generate_signals(bars: &[Bar], params: &SignalParams) -> Result<Vec<Direction>, ParamError> {
    let mut machine = BandReversion::new(*params)?;
    Ok(bars.iter().map(|bar| machine.on_close(bar.close)).collect())
}
