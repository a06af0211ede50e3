//! Frequency plan
//!
//! Tracks the downlink the external system is operating on and the matching
//! uplink the front-end should monitor. The uplink is published through an
//! [`UplinkHandle`] so the tuning callback can read it from the sampling
//! thread while the controller rewrites it during a hand-off.
//!
//! ## Hop law
//!
//! ```text
//!   f_obs <= band_edge  =>  next = f_obs + hop_step
//!   f_obs >  band_edge  =>  next = f_obs - hop_step
//! ```
//!
//! With the default 945 MHz edge and 10 MHz step the plan alternates between
//! two channels (940 MHz <-> 950 MHz).

use crate::config::HopConfig;
use crate::error::{HandoffError, HandoffResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, lock-free view of the current uplink frequency
#[derive(Debug, Clone)]
pub struct UplinkHandle {
    bits: Arc<AtomicU64>,
}

impl UplinkHandle {
    fn new(freq_hz: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(freq_hz.to_bits())),
        }
    }

    /// Current uplink frequency (Hz)
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    fn set(&self, freq_hz: f64) {
        self.bits.store(freq_hz.to_bits(), Ordering::Release);
    }
}

/// Downlink/uplink pair plus the hop rule
#[derive(Debug)]
pub struct FrequencyPlan {
    down_hz: f64,
    uplink: UplinkHandle,
    hop: HopConfig,
}

impl FrequencyPlan {
    /// Plan starting on `initial_down_hz`
    pub fn new(initial_down_hz: f64, hop: HopConfig) -> Self {
        Self {
            down_hz: initial_down_hz,
            uplink: UplinkHandle::new(initial_down_hz - hop.duplex_offset_hz),
            hop,
        }
    }

    /// Current downlink frequency (Hz)
    pub fn down_hz(&self) -> f64 {
        self.down_hz
    }

    /// Current uplink frequency (Hz)
    pub fn up_hz(&self) -> f64 {
        self.uplink.get()
    }

    /// Handle for readers on other threads
    pub fn uplink_handle(&self) -> UplinkHandle {
        self.uplink.clone()
    }

    pub fn hop_config(&self) -> &HopConfig {
        &self.hop
    }

    /// Downlink frequency corresponding to an observed uplink center
    pub fn downlink_for_uplink(&self, up_hz: f64) -> f64 {
        up_hz + self.hop.duplex_offset_hz
    }

    /// Apply the hop law to an observed downlink frequency
    pub fn next_downlink(&self, observed_down_hz: f64) -> f64 {
        next_downlink(observed_down_hz, self.hop.band_edge_hz, self.hop.hop_step_hz)
    }

    /// Move the plan to the channel after `observed_down_hz`.
    ///
    /// Returns the new downlink frequency.
    pub fn advance(&mut self, observed_down_hz: f64) -> f64 {
        let next = self.next_downlink(observed_down_hz);
        self.down_hz = next;
        self.uplink.set(next - self.hop.duplex_offset_hz);
        next
    }

    /// ARFCN of the current downlink
    pub fn arfcn(&self) -> HandoffResult<u32> {
        arfcn_for_downlink(self.down_hz, &self.hop)
    }
}

/// Hop law on downlink frequencies
pub fn next_downlink(observed_down_hz: f64, band_edge_hz: f64, hop_step_hz: f64) -> f64 {
    if observed_down_hz <= band_edge_hz {
        observed_down_hz + hop_step_hz
    } else {
        observed_down_hz - hop_step_hz
    }
}

/// Raw channel number of a downlink frequency, truncated toward zero
pub fn raw_arfcn(down_hz: f64, hop: &HopConfig) -> i64 {
    ((down_hz - hop.arfcn_base_hz) / hop.arfcn_spacing_hz) as i64
}

/// Channel number of a downlink frequency, rejecting negative channels
pub fn arfcn_for_downlink(down_hz: f64, hop: &HopConfig) -> HandoffResult<u32> {
    let arfcn = raw_arfcn(down_hz, hop);
    u32::try_from(arfcn).map_err(|_| HandoffError::NegativeChannelNumber {
        arfcn,
        down_hz: Some(down_hz),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_law() {
        assert_eq!(next_downlink(940e6, 945e6, 10e6), 950e6);
        assert_eq!(next_downlink(950e6, 945e6, 10e6), 940e6);
        // Edge itself hops up
        assert_eq!(next_downlink(945e6, 945e6, 10e6), 955e6);
    }

    #[test]
    fn test_plan_uplink_follows_downlink() {
        let mut plan = FrequencyPlan::new(940e6, HopConfig::default());
        assert_eq!(plan.up_hz(), 895e6);

        let handle = plan.uplink_handle();
        let next = plan.advance(940e6);
        assert_eq!(next, 950e6);
        assert_eq!(plan.down_hz(), 950e6);
        assert_eq!(handle.get(), 905e6);

        plan.advance(plan.down_hz());
        assert_eq!(plan.down_hz(), 940e6);
        assert_eq!(handle.get(), 895e6);
    }

    #[test]
    fn test_downlink_for_uplink() {
        let plan = FrequencyPlan::new(940e6, HopConfig::default());
        assert_eq!(plan.downlink_for_uplink(895e6), 940e6);
    }

    #[test]
    fn test_arfcn() {
        let hop = HopConfig::default();
        assert_eq!(arfcn_for_downlink(935e6, &hop).unwrap(), 0);
        assert_eq!(arfcn_for_downlink(940e6, &hop).unwrap(), 25);
        assert_eq!(arfcn_for_downlink(950e6, &hop).unwrap(), 75);
        // Partial channel truncates
        assert_eq!(arfcn_for_downlink(935.3e6, &hop).unwrap(), 1);
    }

    #[test]
    fn test_negative_arfcn() {
        let hop = HopConfig::default();
        match arfcn_for_downlink(900e6, &hop) {
            Err(HandoffError::NegativeChannelNumber { arfcn, down_hz }) => {
                assert_eq!(arfcn, -175);
                assert_eq!(down_hz, Some(900e6));
            }
            other => panic!("expected NegativeChannelNumber, got {:?}", other),
        }

        let plan = FrequencyPlan::new(900e6, hop);
        assert!(plan.arfcn().is_err());
    }
}
