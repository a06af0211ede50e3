//! Band-Power Estimation
//!
//! Reduces a spectrum frame to one decibel figure for a band centered on
//! the carrier bin:
//!
//! ```text
//!   mean = (m[mid] + Σ_{i=1..w} (m[mid-i] + m[mid+i])) / (2w + 1)
//!   P    = 10·log10(mean / sample_rate) - noise_floor_db
//! ```
//!
//! ## Example
//!
//! ```rust
//! use chanhop_core::estimator::BandPowerEstimator;
//! use chanhop_core::types::SpectrumFrame;
//!
//! let frame = SpectrumFrame::uniform(890e6, 128, 1.0);
//! let power_db = BandPowerEstimator::new(2).estimate(&frame, 1e6).unwrap();
//! assert!((power_db + 60.0).abs() < 1e-9);
//! ```

use crate::error::{HandoffError, HandoffResult};
use crate::types::SpectrumFrame;

/// Default half-width of the measured band, in bins
pub const DEFAULT_HALF_WIDTH_BINS: usize = 102;

/// Band-power estimator for the bins around the carrier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPowerEstimator {
    half_width_bins: usize,
    noise_floor_db: f64,
}

impl BandPowerEstimator {
    /// Estimator over `2 * half_width_bins + 1` bins with no noise-floor offset
    pub fn new(half_width_bins: usize) -> Self {
        Self {
            half_width_bins,
            noise_floor_db: 0.0,
        }
    }

    /// Subtract a fixed noise floor from every estimate
    pub fn with_noise_floor(mut self, noise_floor_db: f64) -> Self {
        self.noise_floor_db = noise_floor_db;
        self
    }

    pub fn half_width_bins(&self) -> usize {
        self.half_width_bins
    }

    pub fn noise_floor_db(&self) -> f64 {
        self.noise_floor_db
    }

    /// Estimate band power of `frame` in dB.
    ///
    /// Fails with `OutOfRange` when the band does not fit inside the frame
    /// and with `InvalidPower` when the result would not be finite.
    pub fn estimate(&self, frame: &SpectrumFrame, sample_rate_hz: f64) -> HandoffResult<f64> {
        let mean = band_mean(frame, self.half_width_bins)?;

        if !(mean > 0.0) || !mean.is_finite() {
            return Err(HandoffError::InvalidPower(mean));
        }

        let power_db = 10.0 * (mean / sample_rate_hz).log10() - self.noise_floor_db;
        if !power_db.is_finite() {
            return Err(HandoffError::InvalidPower(mean));
        }

        Ok(power_db)
    }
}

impl Default for BandPowerEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_HALF_WIDTH_BINS)
    }
}

/// Estimate band power with the default (zero) noise floor
pub fn estimate(
    frame: &SpectrumFrame,
    half_width_bins: usize,
    sample_rate_hz: f64,
) -> HandoffResult<f64> {
    BandPowerEstimator::new(half_width_bins).estimate(frame, sample_rate_hz)
}

fn band_mean(frame: &SpectrumFrame, half_width_bins: usize) -> HandoffResult<f64> {
    let data = frame.magnitudes();
    let mid = frame.mid();

    if half_width_bins > mid || mid + half_width_bins >= data.len() {
        return Err(HandoffError::OutOfRange {
            low: mid as i64 - half_width_bins as i64,
            high: (mid + half_width_bins) as i64,
            bin_count: data.len(),
        });
    }

    let mut sum = data[mid];
    for i in 1..=half_width_bins {
        sum += data[mid - i] + data[mid + i];
    }

    Ok(sum / (2 * half_width_bins + 1) as f64)
}
