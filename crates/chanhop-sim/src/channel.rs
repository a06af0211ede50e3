//! Synthetic Spectrum Channel
//!
//! Produces power spectra for a simulated band: a flat noise floor plus any
//! number of occupying carriers. Frames come out in the same units the
//! band-power estimator expects (squared FFT magnitude, so a bin holding
//! `sample_rate · 10^(P/10)` reads back as `P` dB).
//!
//! ## Channel Models
//!
//! 1. **Ideal**: every bin holds its expected power exactly
//! 2. **Awgn**: per-bin power is exponentially distributed around the
//!    expectation (|complex Gaussian|², i.e. chi-squared with 2 DOF)
//! 3. **Rayleigh**: as Awgn, and each carrier additionally fades flat per
//!    frame
//!
//! ## Usage
//!
//! ```rust
//! use chanhop_sim::channel::{Carrier, SpectrumChannel, SpectrumChannelConfig};
//!
//! let config = SpectrumChannelConfig::ideal(-110.0)
//!     .with_carrier(Carrier::new(895e6, 200e3, -70.0));
//!
//! let mut channel = SpectrumChannel::new(config);
//! let frame = channel.generate(895e6, 256, 1e6);
//! assert_eq!(frame.bin_count(), 256);
//! ```

use chanhop_core::types::SpectrumFrame;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp1};
use serde::{Deserialize, Serialize};

/// Channel model type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ChannelModel {
    /// Expected power in every bin, no randomness
    Ideal,
    /// Exponentially distributed bin power
    #[default]
    Awgn,
    /// Awgn plus flat per-frame fading of each carrier
    Rayleigh,
}

impl ChannelModel {
    /// Parse channel model from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ideal" => Some(ChannelModel::Ideal),
            "awgn" => Some(ChannelModel::Awgn),
            "rayleigh" => Some(ChannelModel::Rayleigh),
            _ => None,
        }
    }
}

/// A transmission occupying part of the band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
    /// Center frequency in Hz
    pub center_hz: f64,
    /// Occupied bandwidth in Hz
    pub bandwidth_hz: f64,
    /// Band power in dB
    pub power_db: f64,
}

impl Carrier {
    pub fn new(center_hz: f64, bandwidth_hz: f64, power_db: f64) -> Self {
        Self {
            center_hz,
            bandwidth_hz,
            power_db,
        }
    }

    /// Does this carrier cover `freq_hz`?
    pub fn covers(&self, freq_hz: f64) -> bool {
        (freq_hz - self.center_hz).abs() <= self.bandwidth_hz / 2.0
    }
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumChannelConfig {
    /// Channel model to use
    pub model: ChannelModel,
    /// Noise floor in dB
    pub noise_floor_db: f64,
    /// Active carriers
    #[serde(default)]
    pub carriers: Vec<Carrier>,
    /// RNG seed (entropy when unset)
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SpectrumChannelConfig {
    fn default() -> Self {
        Self {
            model: ChannelModel::Awgn,
            noise_floor_db: -110.0,
            carriers: Vec::new(),
            seed: None,
        }
    }
}

impl SpectrumChannelConfig {
    /// Deterministic channel with only a noise floor
    pub fn ideal(noise_floor_db: f64) -> Self {
        Self {
            model: ChannelModel::Ideal,
            noise_floor_db,
            ..Default::default()
        }
    }

    /// Random channel with a fixed seed
    pub fn seeded(model: ChannelModel, noise_floor_db: f64, seed: u64) -> Self {
        Self {
            model,
            noise_floor_db,
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// Add a carrier
    pub fn with_carrier(mut self, carrier: Carrier) -> Self {
        self.carriers.push(carrier);
        self
    }
}

/// Spectrum generator
#[derive(Debug)]
pub struct SpectrumChannel {
    config: SpectrumChannelConfig,
    rng: StdRng,
}

impl SpectrumChannel {
    /// Create a new channel with the given configuration
    pub fn new(config: SpectrumChannelConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    /// Get current configuration
    pub fn config(&self) -> &SpectrumChannelConfig {
        &self.config
    }

    /// Expected (noise-free) power of the bin at `freq_hz`, linear
    pub fn expected_bin_power(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        let noise = db_to_magnitude(self.config.noise_floor_db, sample_rate);
        let carriers: f64 = self
            .config
            .carriers
            .iter()
            .filter(|c| c.covers(freq_hz))
            .map(|c| db_to_magnitude(c.power_db, sample_rate))
            .sum();
        noise + carriers
    }

    /// One power spectrum of `fft_size` bins centered on `center_hz`
    pub fn generate(&mut self, center_hz: f64, fft_size: usize, sample_rate: f64) -> SpectrumFrame {
        let bin_width = sample_rate / fft_size as f64;
        let mid = fft_size / 2;
        let noise = db_to_magnitude(self.config.noise_floor_db, sample_rate);

        // Flat fade per carrier for this frame
        let fades: Vec<f64> = self
            .config
            .carriers
            .iter()
            .map(|_| match self.config.model {
                ChannelModel::Rayleigh => Exp1.sample(&mut self.rng),
                _ => 1.0,
            })
            .collect();

        let magnitudes = (0..fft_size)
            .map(|i| {
                let freq = center_hz + (i as f64 - mid as f64) * bin_width;
                let carrier_power: f64 = self
                    .config
                    .carriers
                    .iter()
                    .zip(&fades)
                    .filter(|(c, _)| c.covers(freq))
                    .map(|(c, fade)| db_to_magnitude(c.power_db, sample_rate) * fade)
                    .sum();
                let expected = noise + carrier_power;

                match self.config.model {
                    ChannelModel::Ideal => expected,
                    ChannelModel::Awgn | ChannelModel::Rayleigh => {
                        let draw: f64 = Exp1.sample(&mut self.rng);
                        expected * draw
                    }
                }
            })
            .collect();

        SpectrumFrame::new(center_hz, magnitudes)
    }
}

/// Bin magnitude that the estimator reads back as `power_db`
pub fn db_to_magnitude(power_db: f64, sample_rate: f64) -> f64 {
    sample_rate * 10f64.powf(power_db / 10.0)
}
