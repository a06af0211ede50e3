//! Radio front-end boundary
//!
//! The receiver driver is not part of this crate; it is reached through the
//! [`FrontEnd`] trait. `chanhop-sim` provides a software implementation.

use tracing::info;

/// Control surface of a tunable receiver
pub trait FrontEnd: Send {
    /// Tune to `target_hz` with the RF LO at `target_hz + lo_offset_hz`.
    ///
    /// Returns false if the device rejected the request.
    fn retune(&mut self, target_hz: f64, lo_offset_hz: f64) -> bool;

    /// Achieved sample rate (Hz)
    fn sample_rate(&self) -> f64;

    /// Supported gain range (dB)
    fn gain_range(&self) -> (f64, f64);

    /// Midpoint of the gain range (dB)
    fn gain_midpoint(&self) -> f64 {
        let (start, stop) = self.gain_range();
        (start + stop) / 2.0
    }

    fn set_gain(&mut self, gain_db: f64);
}

/// Apply the configured gain, or the midpoint when none is given.
///
/// Returns the gain that was set.
pub fn apply_gain<F: FrontEnd + ?Sized>(frontend: &mut F, gain_db: Option<f64>) -> f64 {
    let gain = gain_db.unwrap_or_else(|| frontend.gain_midpoint());
    frontend.set_gain(gain);
    info!("gain = {}", gain);
    gain
}
