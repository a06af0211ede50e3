//! Spectrum frame type
//!
//! One frame is one reduction of the sample stream for a single dwell:
//! the tuned center frequency and the squared FFT magnitude of every bin,
//! DC (the carrier bin) at `bin_count / 2`.

/// A single power spectrum captured at one dwell
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// Tuned center frequency when the frame was captured (Hz)
    center_frequency_hz: f64,
    /// Squared-magnitude power per bin, FFT-shifted
    magnitudes: Vec<f64>,
}

impl SpectrumFrame {
    /// Create a frame from its center frequency and bin magnitudes
    pub fn new(center_frequency_hz: f64, magnitudes: Vec<f64>) -> Self {
        Self {
            center_frequency_hz,
            magnitudes,
        }
    }

    /// Frame filled with one magnitude value
    pub fn uniform(center_frequency_hz: f64, bin_count: usize, magnitude: f64) -> Self {
        Self::new(center_frequency_hz, vec![magnitude; bin_count])
    }

    /// Center frequency at capture time (Hz)
    pub fn center_frequency_hz(&self) -> f64 {
        self.center_frequency_hz
    }

    /// Number of bins
    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }

    /// Index of the carrier bin
    pub fn mid(&self) -> usize {
        self.magnitudes.len() / 2
    }

    /// Bin magnitudes
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }
}
