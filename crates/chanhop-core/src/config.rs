//! Monitor configuration
//!
//! The radio/pipeline settings ([`MonitorConfig`]), the detector tuning
//! ([`DetectorConfig`]) and the channel-plan constants ([`HopConfig`]).
//! All three deserialize from JSON with per-field defaults, so a config file
//! only needs to name what it changes.

use crate::cusum::{DEFAULT_THRESHOLD_DB, DEFAULT_TRIGGER_COUNT};
use crate::estimator::DEFAULT_HALF_WIDTH_BINS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest FFT the pipeline accepts (bins per frame)
pub const MAX_FFT_SIZE: usize = 1 << 20;

/// Radio front-end and spectrum pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Device address arguments
    pub device_addr: String,
    /// Subdevice specification
    pub subdev_spec: Option<String>,
    /// Receive antenna
    pub antenna: Option<String>,
    /// Requested sample rate in Hz
    pub sample_rate: f64,
    /// Width of one FFT bin in Hz
    pub channel_bandwidth: f64,
    /// Receive gain in dB (front-end midpoint when unset)
    pub gain: Option<f64>,
    /// Seconds to wait after retuning before collecting
    pub tune_delay: f64,
    /// Seconds to collect at one frequency
    pub dwell_delay: f64,
    /// LO offset in Hz
    pub lo_offset: f64,
    /// Squelch threshold in dB. Accepted but not used by the detector.
    pub squelch_threshold: Option<f64>,
    /// FFT size (sample_rate / channel_bandwidth when unset)
    pub fft_size: Option<usize>,
    /// Try to enable realtime scheduling
    pub real_time: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device_addr: "addr=192.168.20.2".to_string(),
            subdev_spec: None,
            antenna: None,
            sample_rate: 1e6,
            channel_bandwidth: 976.56,
            gain: None,
            tune_delay: 0.25,
            dwell_delay: 0.25,
            lo_offset: 0.0,
            squelch_threshold: None,
            fft_size: None,
            real_time: false,
        }
    }
}

impl MonitorConfig {
    /// Number of FFT bins per frame at the given achieved sample rate.
    ///
    /// Fails unless the size lies in `1..=MAX_FFT_SIZE`.
    pub fn fft_size(&self, sample_rate: f64) -> Result<usize, ConfigError> {
        let size = match self.fft_size {
            Some(size) => size,
            None => {
                if !(self.channel_bandwidth > 0.0) {
                    return Err(ConfigError::InvalidValue(format!(
                        "channel bandwidth must be positive, got {}",
                        self.channel_bandwidth
                    )));
                }
                let bins = (sample_rate / self.channel_bandwidth).floor();
                if !(1.0..=MAX_FFT_SIZE as f64).contains(&bins) {
                    return Err(ConfigError::InvalidValue(format!(
                        "{} Hz bins at {} S/s give {} bins, outside 1..={}",
                        self.channel_bandwidth, sample_rate, bins, MAX_FFT_SIZE
                    )));
                }
                bins as usize
            }
        };

        if size == 0 || size > MAX_FFT_SIZE {
            return Err(ConfigError::InvalidValue(format!(
                "FFT size {} outside 1..={}",
                size, MAX_FFT_SIZE
            )));
        }
        Ok(size)
    }

    /// Tune delay expressed in frames of `fft_size` bins
    pub fn tune_delay_frames(&self, sample_rate: f64, fft_size: usize) -> usize {
        let frames = (self.tune_delay * sample_rate / fft_size as f64).round();
        frames.max(0.0) as usize
    }

    /// Dwell delay expressed in frames of `fft_size` bins, at least one
    pub fn dwell_delay_frames(&self, sample_rate: f64, fft_size: usize) -> usize {
        let frames = (self.dwell_delay * sample_rate / fft_size as f64).round();
        frames.max(1.0) as usize
    }
}

/// CUSUM detector tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Reference power the statistic accumulates against (dB)
    pub threshold_db: f64,
    /// Fire once the positive run exceeds this many frames
    pub trigger_count: u32,
    /// Half-width of the measured band in bins
    pub half_width_bins: usize,
    /// Offset subtracted from every power estimate (dB)
    pub noise_floor_db: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_db: DEFAULT_THRESHOLD_DB,
            trigger_count: DEFAULT_TRIGGER_COUNT,
            half_width_bins: DEFAULT_HALF_WIDTH_BINS,
            noise_floor_db: 0.0,
        }
    }
}

/// Channel plan and hand-off timing
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HopConfig {
    /// Uplink sits this far below the downlink (Hz)
    pub duplex_offset_hz: f64,
    /// Hop up at or below this downlink frequency, down above it (Hz)
    pub band_edge_hz: f64,
    /// Size of one hop (Hz)
    pub hop_step_hz: f64,
    /// Downlink frequency of ARFCN 0 (Hz)
    pub arfcn_base_hz: f64,
    /// Channel raster (Hz)
    pub arfcn_spacing_hz: f64,
    /// Pause after the external system starts
    #[serde(with = "secs_f64")]
    pub settle_delay: Duration,
    /// Upper bound on one backpressure wait in the tuning callback
    #[serde(with = "secs_f64")]
    pub backlog_poll_interval: Duration,
}

impl Default for HopConfig {
    fn default() -> Self {
        Self {
            duplex_offset_hz: 45e6,
            band_edge_hz: 945e6,
            hop_step_hz: 10e6,
            arfcn_base_hz: 935e6,
            arfcn_spacing_hz: 2e5,
            settle_delay: Duration::from_millis(250),
            backlog_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Complete configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChanhopConfig {
    pub monitor: MonitorConfig,
    pub detector: DetectorConfig,
    pub hop: HopConfig,
}

impl ChanhopConfig {
    /// Load a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Configuration loading errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Parse(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("invalid setting: {0}")]
    InvalidValue(String),
}

/// Parse a number in engineering notation.
///
/// Accepts plain floats (`976.56`, `1e6`) and SI suffixes from pico to tera
/// (`945M`, `250k`, `1.5G`).
pub fn parse_eng(s: &str) -> Result<f64, ConfigError> {
    let trimmed = s.trim();
    let invalid = || ConfigError::InvalidNumber(s.to_string());

    let last = trimmed.chars().last().ok_or_else(invalid)?;
    let scale = match last {
        'T' => Some(1e12),
        'G' => Some(1e9),
        'M' => Some(1e6),
        'k' | 'K' => Some(1e3),
        'm' => Some(1e-3),
        'u' => Some(1e-6),
        'n' => Some(1e-9),
        'p' => Some(1e-12),
        _ => None,
    };

    let value = match scale {
        Some(scale) => {
            let number = &trimmed[..trimmed.len() - last.len_utf8()];
            number.parse::<f64>().map_err(|_| invalid())? * scale
        }
        None => trimmed.parse::<f64>().map_err(|_| invalid())?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid())
    }
}

mod secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
