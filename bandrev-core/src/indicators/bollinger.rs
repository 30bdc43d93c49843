//! Bollinger Bands — rolling mean +/- multiplier * rolling standard deviation.
//!
//! - Middle: mean(close) over the trailing `period` bars
//! - Upper: middle + mult * stddev
//! - Lower: middle - mult * stddev
//!
//! Uses population stddev (divide by N). The window is expanding while fewer
//! than `period` closes have been seen, so the first bar already has a band
//! (mean = close, stddev = 0).
//!
//! Mean and second moment are maintained with Welford add/remove updates, which
//! keeps the pass O(1) per bar without the cancellation error of a naive
//! sum-of-squares on prices in the tens of thousands.

use std::collections::VecDeque;

/// Upper bound on the window buffer reserved up front; longer windows grow on demand.
const MAX_PREALLOC: usize = 4096;

/// Band values for one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub mean: f64,
    pub std: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Streaming rolling mean / population stddev over the last `period` closes.
#[derive(Debug, Clone)]
pub struct RollingBands {
    period: usize,
    multiplier: f64,
    window: VecDeque<f64>,
    mean: f64,
    m2: f64,
    nan_count: usize,
}

impl RollingBands {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            multiplier,
            window: VecDeque::with_capacity(period.min(MAX_PREALLOC)),
            mean: 0.0,
            m2: 0.0,
            nan_count: 0,
        }
    }

    /// Feed the next close and return the band over the current window.
    ///
    /// A NaN close poisons every band whose window contains it.
    pub fn push(&mut self, close: f64) -> Band {
        self.window.push_back(close);
        if close.is_nan() {
            self.nan_count += 1;
        } else {
            self.add(close);
        }

        if self.window.len() > self.period {
            if let Some(leaving) = self.window.pop_front() {
                if leaving.is_nan() {
                    self.nan_count -= 1;
                } else {
                    self.remove(leaving);
                }
            }
        }

        if self.nan_count > 0 {
            return Band {
                mean: f64::NAN,
                std: f64::NAN,
                upper: f64::NAN,
                lower: f64::NAN,
            };
        }

        let n = self.window.len() as f64;
        let std = (self.m2 / n).max(0.0).sqrt();
        Band {
            mean: self.mean,
            std,
            upper: self.mean + self.multiplier * std,
            lower: self.mean - self.multiplier * std,
        }
    }

    fn finite_len(&self) -> f64 {
        (self.window.len() - self.nan_count) as f64
    }

    fn add(&mut self, x: f64) {
        let count = self.finite_len();
        let delta = x - self.mean;
        self.mean += delta / count;
        self.m2 += delta * (x - self.mean);
    }

    fn remove(&mut self, x: f64) {
        // `window` has already dropped `x`.
        let count = self.finite_len();
        if count == 0.0 {
            self.mean = 0.0;
            self.m2 = 0.0;
            return;
        }
        let delta = x - self.mean;
        self.mean -= delta / count;
        self.m2 -= delta * (x - self.mean);
        if self.m2 < 0.0 {
            self.m2 = 0.0;
        }
    }
}

/// Compute bands for a whole close series.
pub fn bollinger_bands(closes: &[f64], period: usize, multiplier: f64) -> Vec<Band> {
    let mut bands = RollingBands::new(period, multiplier);
    closes.iter().map(|&c| bands.push(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    fn naive_band(window: &[f64], multiplier: f64) -> (f64, f64) {
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let var = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        (mean, mean + multiplier * std)
    }

    #[test]
    fn first_bar_has_zero_width_band() {
        let bands = bollinger_bands(&[100.0], 20, 2.0);
        assert_approx(bands[0].mean, 100.0, DEFAULT_EPSILON);
        assert_approx(bands[0].std, 0.0, DEFAULT_EPSILON);
        assert_approx(bands[0].upper, 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn expanding_window_before_period() {
        let bands = bollinger_bands(&[10.0, 12.0, 14.0], 5, 2.0);
        // mean(10,12) = 11, pstd = 1
        assert_approx(bands[1].mean, 11.0, DEFAULT_EPSILON);
        assert_approx(bands[1].std, 1.0, DEFAULT_EPSILON);
        assert_approx(bands[1].upper, 13.0, DEFAULT_EPSILON);
        assert_approx(bands[1].lower, 9.0, DEFAULT_EPSILON);
        assert_approx(bands[2].mean, 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_matches_naive_recompute() {
        let closes: Vec<f64> = (0..200)
            .map(|i| 20_000.0 + (i as f64 * 0.37).sin() * 150.0 + i as f64)
            .collect();
        let period = 17;
        let bands = bollinger_bands(&closes, period, 2.5);
        for i in 0..closes.len() {
            let start = (i + 1).saturating_sub(period);
            let (mean, upper) = naive_band(&closes[start..=i], 2.5);
            assert_approx(bands[i].mean, mean, 1e-6);
            assert_approx(bands[i].upper, upper, 1e-6);
        }
    }

    #[test]
    fn constant_price_zero_width() {
        let bands = bollinger_bands(&[100.0; 10], 3, 2.0);
        for b in &bands {
            assert_approx(b.upper, 100.0, DEFAULT_EPSILON);
            assert_approx(b.lower, 100.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn nan_poisons_window_then_recovers() {
        let bands = bollinger_bands(&[10.0, 11.0, f64::NAN, 13.0, 14.0, 15.0], 3, 2.0);
        assert!(bands[2].mean.is_nan());
        assert!(bands[3].mean.is_nan());
        assert!(bands[4].mean.is_nan());
        assert_approx(bands[5].mean, 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn window_longer_than_history_keeps_expanding() {
        let bands = bollinger_bands(&[10.0, 12.0, 14.0], usize::MAX, 2.0);
        assert_approx(bands[2].mean, 12.0, DEFAULT_EPSILON);
        let bands = bollinger_bands(&[10.0, 12.0], 100_000_000_000, 2.0);
        assert_approx(bands[1].std, 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn symmetric_bands() {
        let bands = bollinger_bands(&[10.0, 11.0, 12.0, 13.0, 14.0], 3, 2.0);
        for b in &bands {
            assert_approx(b.upper - b.mean, b.mean - b.lower, DEFAULT_EPSILON);
        }
    }
}
