//! CUSUM hand-off controller
//!
//! Owns the detector and the frequency plan and drives the hand-off state
//! machine:
//!
//! ```text
//!             ┌──────────────────────────────────────────────┐
//!             ▼                                              │
//!   STARTING(f) ──first frame──▶ RUNNING(f) ──trigger──▶ STOPPING(f_obs)
//!                                                            │
//!             STARTING(next) ◀── SELECTING_NEXT(f_obs) ◀─────┘
//! ```
//!
//! Frames are consumed strictly in arrival order on the calling thread.
//! Estimator errors skip a single frame; every other error ends the run.

use crate::basestation::BaseStation;
use crate::config::{DetectorConfig, HopConfig};
use crate::cusum::{CusumDecision, CusumDetector};
use crate::error::{HandoffError, HandoffResult};
use crate::estimator::BandPowerEstimator;
use crate::frame_source::FrameSource;
use crate::plan::{arfcn_for_downlink, FrequencyPlan, UplinkHandle};
use crate::types::SpectrumFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hand-off state; frequencies are downlink frequencies in Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandoffState {
    /// Launching the external system on this channel
    Starting(f64),
    /// Monitoring the channel the external system is on
    Running(f64),
    /// Tearing the external system down after a trigger
    Stopping(f64),
    /// Picking the channel after the observed one
    SelectingNext(f64),
}

/// Counters for one controller run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames folded into the detector
    pub frames_processed: u64,
    /// Frames dropped because the estimator rejected them
    pub frames_skipped: u64,
    /// Completed stop/select/start cycles
    pub handoffs: u64,
}

/// Sequential frame consumer and hand-off state machine
pub struct HandoffController<S, B> {
    source: S,
    base_station: B,
    estimator: BandPowerEstimator,
    detector: CusumDetector,
    plan: FrequencyPlan,
    sample_rate_hz: f64,
    settle_delay: Duration,
    state: HandoffState,
    shutdown: Arc<AtomicBool>,
    max_handoffs: Option<u64>,
    summary: RunSummary,
}

impl<S: FrameSource, B: BaseStation> HandoffController<S, B> {
    /// Controller that will start the external system on `initial_down_hz`
    pub fn new(
        source: S,
        base_station: B,
        initial_down_hz: f64,
        sample_rate_hz: f64,
        detector: DetectorConfig,
        hop: HopConfig,
    ) -> Self {
        Self {
            source,
            base_station,
            estimator: BandPowerEstimator::new(detector.half_width_bins)
                .with_noise_floor(detector.noise_floor_db),
            detector: CusumDetector::new(detector.threshold_db, detector.trigger_count),
            plan: FrequencyPlan::new(initial_down_hz, hop),
            sample_rate_hz,
            settle_delay: hop.settle_delay,
            state: HandoffState::Starting(initial_down_hz),
            shutdown: Arc::new(AtomicBool::new(false)),
            max_handoffs: None,
            summary: RunSummary::default(),
        }
    }

    /// Return from [`run`](Self::run) after this many hand-offs
    pub fn with_max_handoffs(mut self, max_handoffs: u64) -> Self {
        self.max_handoffs = Some(max_handoffs);
        self
    }

    /// Stop the run at the next frame boundary once `shutdown` is set
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Uplink handle for the tuning callback
    pub fn uplink_handle(&self) -> UplinkHandle {
        self.plan.uplink_handle()
    }

    pub fn state(&self) -> HandoffState {
        self.state
    }

    pub fn plan(&self) -> &FrequencyPlan {
        &self.plan
    }

    pub fn detector(&self) -> &CusumDetector {
        &self.detector
    }

    pub fn base_station(&self) -> &B {
        &self.base_station
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Cycle through hand-offs until shutdown, the hand-off limit, or a
    /// fatal error.
    ///
    /// A closed frame source counts as shutdown. So does any error raised
    /// after shutdown was requested, since an interrupt also reaches the
    /// external system's start/stop commands.
    pub fn run(&mut self) -> HandoffResult<RunSummary> {
        loop {
            if self.shutting_down() {
                info!("shutdown requested");
                return Ok(self.summary);
            }

            match self.step() {
                Ok(true) => {}
                Ok(false) => return Ok(self.summary),
                Err(HandoffError::QueueClosed) => {
                    info!("frame source closed");
                    return Ok(self.summary);
                }
                Err(e) if self.shutting_down() => {
                    warn!("{} during shutdown", e);
                    return Ok(self.summary);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Perform one state transition. Returns false when the run is over.
    pub fn step(&mut self) -> HandoffResult<bool> {
        match self.state {
            HandoffState::Starting(down_hz) => {
                self.start_external(down_hz)?;
                self.detector.reset();
                self.state = HandoffState::Running(down_hz);
                info!("running on {} Hz", down_hz);

                if let Some(max) = self.max_handoffs {
                    if self.summary.handoffs >= max {
                        return Ok(false);
                    }
                }
            }
            HandoffState::Running(_) => match self.detect()? {
                Some(observed_down_hz) => {
                    info!("stopping external system at {} Hz", observed_down_hz);
                    self.state = HandoffState::Stopping(observed_down_hz);
                }
                None => return Ok(false),
            },
            HandoffState::Stopping(observed_down_hz) => {
                self.base_station.stop()?;
                self.state = HandoffState::SelectingNext(observed_down_hz);
            }
            HandoffState::SelectingNext(observed_down_hz) => {
                let next = self.plan.advance(observed_down_hz);
                info!("new uplink: {} Hz", self.plan.up_hz());
                self.summary.handoffs += 1;
                self.state = HandoffState::Starting(next);
            }
        }
        Ok(true)
    }

    fn start_external(&mut self, down_hz: f64) -> HandoffResult<()> {
        let arfcn = arfcn_for_downlink(down_hz, self.plan.hop_config())?;
        info!("ARFCN = {}", arfcn);

        self.base_station.write_channel_config(i64::from(arfcn))?;
        self.base_station.start()?;

        // The frame in flight was captured before the restart
        self.source.receive()?;
        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }
        Ok(())
    }

    /// Consume frames until the detector fires.
    ///
    /// Returns the observed downlink frequency, or `None` on shutdown.
    fn detect(&mut self) -> HandoffResult<Option<f64>> {
        loop {
            if self.shutting_down() {
                return Ok(None);
            }

            let frame = self.source.receive()?;
            match self.observe(&frame) {
                Ok(decision) if decision.is_triggered() => {
                    info!("CUSUM is now positive");
                    let observed = self.plan.downlink_for_uplink(frame.center_frequency_hz());
                    return Ok(Some(observed));
                }
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(
                        "center_freq {} skipped: {}",
                        frame.center_frequency_hz(),
                        e
                    );
                    self.summary.frames_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fold one frame into the detector.
    ///
    /// On an estimator error the detector is left untouched.
    pub fn observe(&mut self, frame: &SpectrumFrame) -> HandoffResult<CusumDecision> {
        let power_db = self.estimator.estimate(frame, self.sample_rate_hz)?;
        let decision = self.detector.update(power_db);
        self.summary.frames_processed += 1;

        info!(
            "center_freq {} power_db {:.2} cusum {:.2}",
            frame.center_frequency_hz(),
            power_db,
            self.detector.value()
        );
        debug!("positive run {}", self.detector.consecutive_positive());

        Ok(decision)
    }
}
