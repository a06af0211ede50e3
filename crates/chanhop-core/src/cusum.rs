//! One-sided CUSUM occupancy detector
//!
//! Accumulates how far the band power sits above a fixed reference:
//!
//! ```text
//!   C(n) = max(0, C(n-1) + P(n) - threshold_db)
//! ```
//!
//! A single spike above the threshold only bumps `C`; the detector fires once
//! `C` has stayed positive for more than `trigger_count` consecutive frames.
//! The positive-run counter restarts whenever `C` falls back to zero.

use serde::{Deserialize, Serialize};

/// Default reference power (dB)
pub const DEFAULT_THRESHOLD_DB: f64 = -90.0;

/// Default number of positive frames that must be exceeded to fire
pub const DEFAULT_TRIGGER_COUNT: u32 = 2;

/// Outcome of feeding one power estimate to the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CusumDecision {
    /// Statistic is zero; channel looks idle
    Idle,
    /// Statistic is positive but the run is still too short
    Accumulating { cusum: f64, run: u32 },
    /// Sustained positive deviation; hand the channel off
    Triggered { cusum: f64, run: u32 },
}

impl CusumDecision {
    pub fn is_triggered(&self) -> bool {
        matches!(self, CusumDecision::Triggered { .. })
    }
}

/// Running detector state for one detection epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CusumDetector {
    /// Reference power in dB
    threshold_db: f64,
    /// Positive frames that must be exceeded to fire
    trigger_count: u32,
    /// Current statistic, never negative
    cusum: f64,
    /// Consecutive frames with a positive statistic
    consecutive_positive: u32,
}

impl CusumDetector {
    /// Create a detector with a fresh (zero) statistic
    pub fn new(threshold_db: f64, trigger_count: u32) -> Self {
        Self {
            threshold_db,
            trigger_count,
            cusum: 0.0,
            consecutive_positive: 0,
        }
    }

    /// Feed one band-power estimate.
    ///
    /// Non-finite input is ignored and reported as the current decision
    /// without touching the statistic.
    pub fn update(&mut self, power_db: f64) -> CusumDecision {
        if power_db.is_finite() {
            self.cusum = (self.cusum + power_db - self.threshold_db).max(0.0);

            if self.cusum > 0.0 {
                self.consecutive_positive = self.consecutive_positive.saturating_add(1);
            } else {
                self.consecutive_positive = 0;
            }
        }

        self.decision()
    }

    /// Decision for the current state
    pub fn decision(&self) -> CusumDecision {
        if self.cusum <= 0.0 {
            CusumDecision::Idle
        } else if self.consecutive_positive > self.trigger_count {
            CusumDecision::Triggered {
                cusum: self.cusum,
                run: self.consecutive_positive,
            }
        } else {
            CusumDecision::Accumulating {
                cusum: self.cusum,
                run: self.consecutive_positive,
            }
        }
    }

    /// Start a new epoch
    pub fn reset(&mut self) {
        self.cusum = 0.0;
        self.consecutive_positive = 0;
    }

    /// Current statistic
    pub fn value(&self) -> f64 {
        self.cusum
    }

    /// Current positive-run length
    pub fn consecutive_positive(&self) -> u32 {
        self.consecutive_positive
    }

    pub fn threshold_db(&self) -> f64 {
        self.threshold_db
    }

    pub fn trigger_count(&self) -> u32 {
        self.trigger_count
    }
}

impl Default for CusumDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_DB, DEFAULT_TRIGGER_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recurrence_and_non_negative() {
        let mut detector = CusumDetector::new(-90.0, 2);
        let inputs = [-80.0, -95.0, -120.0, -85.0, -89.0, -200.0, -60.0];
        let mut expected = 0.0f64;

        for &p in &inputs {
            detector.update(p);
            expected = (expected + p - (-90.0)).max(0.0);
            assert!(detector.value() >= 0.0);
            assert!((detector.value() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_below_threshold_never_fires() {
        let mut detector = CusumDetector::new(-90.0, 2);
        for _ in 0..3 {
            let decision = detector.update(-95.0);
            assert_eq!(decision, CusumDecision::Idle);
        }
        assert_eq!(detector.consecutive_positive(), 0);
    }

    #[test]
    fn test_fires_after_trigger_count_plus_one() {
        let mut detector = CusumDetector::new(-90.0, 2);

        assert!(!detector.update(-85.0).is_triggered());
        assert!(!detector.update(-85.0).is_triggered());

        let decision = detector.update(-85.0);
        match decision {
            CusumDecision::Triggered { cusum, run } => {
                assert_eq!(run, 3);
                assert!((cusum - 15.0).abs() < 1e-12);
            }
            other => panic!("expected trigger on third frame, got {:?}", other),
        }
    }

    #[test]
    fn test_run_resets_when_statistic_returns_to_zero() {
        let mut detector = CusumDetector::new(-90.0, 2);
        detector.update(-89.0);
        detector.update(-89.0);
        assert_eq!(detector.consecutive_positive(), 2);

        // Deep drop pulls the statistic back to zero
        assert_eq!(detector.update(-120.0), CusumDecision::Idle);
        assert_eq!(detector.consecutive_positive(), 0);

        assert!(!detector.update(-89.0).is_triggered());
    }

    #[test]
    fn test_transient_spike_keeps_run_alive_while_positive() {
        let mut detector = CusumDetector::new(-90.0, 3);
        detector.update(-50.0); // C = 40
        detector.update(-100.0); // C = 30, still positive
        let decision = detector.update(-100.0); // C = 20
        assert!(!decision.is_triggered());
        assert!(detector.update(-100.0).is_triggered()); // C = 10, run = 4
    }

    #[test]
    fn test_non_finite_input_leaves_state() {
        let mut detector = CusumDetector::new(-90.0, 2);
        detector.update(-80.0);
        let before = detector.value();

        detector.update(f64::NAN);
        detector.update(f64::NEG_INFINITY);

        assert_eq!(detector.value(), before);
        assert_eq!(detector.consecutive_positive(), 1);
    }

    #[test]
    fn test_reset() {
        let mut detector = CusumDetector::default();
        detector.update(-10.0);
        detector.reset();
        assert_eq!(detector.value(), 0.0);
        assert_eq!(detector.consecutive_positive(), 0);
        assert_eq!(detector.decision(), CusumDecision::Idle);
    }
}
