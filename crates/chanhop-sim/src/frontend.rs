//! Simulated receiver front-end

use chanhop_core::frontend::FrontEnd;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Simulated receiver limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrontEndConfig {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Lowest tunable RF frequency in Hz
    pub min_frequency: f64,
    /// Highest tunable RF frequency in Hz
    pub max_frequency: f64,
    /// Gain range in dB
    pub gain_range: (f64, f64),
}

impl Default for SimFrontEndConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1e6,
            min_frequency: 70e6,
            max_frequency: 6e9,
            gain_range: (0.0, 76.0),
        }
    }
}

/// Software front-end that accepts any in-range tune request
#[derive(Debug, Clone)]
pub struct SimFrontEnd {
    config: SimFrontEndConfig,
    frequency: f64,
    gain: f64,
    retunes: u64,
}

impl SimFrontEnd {
    pub fn new(config: SimFrontEndConfig) -> Self {
        let gain = (config.gain_range.0 + config.gain_range.1) / 2.0;
        Self {
            config,
            frequency: 0.0,
            gain,
            retunes: 0,
        }
    }

    /// Last accepted tuning frequency (Hz)
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Number of accepted retunes
    pub fn retunes(&self) -> u64 {
        self.retunes
    }
}

impl Default for SimFrontEnd {
    fn default() -> Self {
        Self::new(SimFrontEndConfig::default())
    }
}

impl FrontEnd for SimFrontEnd {
    fn retune(&mut self, target_hz: f64, lo_offset_hz: f64) -> bool {
        let rf = target_hz + lo_offset_hz;
        if !(self.config.min_frequency..=self.config.max_frequency).contains(&rf) {
            debug!("rf {} Hz outside tuning range", rf);
            return false;
        }
        self.frequency = target_hz;
        self.retunes += 1;
        true
    }

    fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    fn gain_range(&self) -> (f64, f64) {
        self.config.gain_range
    }

    fn set_gain(&mut self, gain_db: f64) {
        let (lo, hi) = self.config.gain_range;
        self.gain = gain_db.clamp(lo, hi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retune_in_range() {
        let mut fe = SimFrontEnd::default();
        assert!(fe.retune(895e6, 0.0));
        assert_eq!(fe.frequency(), 895e6);
        assert_eq!(fe.retunes(), 1);
    }

    #[test]
    fn test_retune_out_of_range() {
        let mut fe = SimFrontEnd::new(SimFrontEndConfig {
            max_frequency: 900e6,
            ..Default::default()
        });
        assert!(fe.retune(895e6, 0.0));
        // LO offset pushes the RF frequency over the limit
        assert!(!fe.retune(895e6, 10e6));
        assert_eq!(fe.frequency(), 895e6);
        assert_eq!(fe.retunes(), 1);
    }

    #[test]
    fn test_gain() {
        let mut fe = SimFrontEnd::default();
        assert_eq!(fe.gain_midpoint(), 38.0);
        fe.set_gain(100.0);
        assert_eq!(fe.gain(), 76.0);
    }
}
