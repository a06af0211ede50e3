//! Tuning callback
//!
//! The sampling pipeline asks a [`FrequencyProvider`] for the next dwell
//! frequency every time it is ready to move on. [`Tuner`] answers with the
//! plan's current uplink, retunes the front-end to it, and then holds the
//! pipeline until the frame backlog has room again.

use crate::error::{HandoffError, HandoffResult};
use crate::frame_source::FrameSource;
use crate::frontend::FrontEnd;
use crate::plan::UplinkHandle;
use std::time::Duration;
use tracing::{error, trace};

/// Supplies the frequency for the next dwell
pub trait FrequencyProvider: Send {
    fn next_frequency(&mut self) -> HandoffResult<f64>;
}

impl<F> FrequencyProvider for F
where
    F: FnMut() -> HandoffResult<f64> + Send,
{
    fn next_frequency(&mut self) -> HandoffResult<f64> {
        self()
    }
}

/// Front-end tuning callback with backlog backpressure
pub struct Tuner<F, S> {
    frontend: F,
    uplink: UplinkHandle,
    source: S,
    lo_offset_hz: f64,
    poll_interval: Duration,
}

impl<F: FrontEnd, S: FrameSource> Tuner<F, S> {
    pub fn new(
        frontend: F,
        uplink: UplinkHandle,
        source: S,
        lo_offset_hz: f64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            frontend,
            uplink,
            source,
            lo_offset_hz,
            poll_interval,
        }
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    fn wait_for_backlog(&self) -> HandoffResult<()> {
        while self.source.is_backlog_full() {
            if self.source.is_closed() {
                return Err(HandoffError::QueueClosed);
            }
            trace!("frame backlog full, holding");
            self.source.wait_for_capacity(self.poll_interval);
        }
        if self.source.is_closed() {
            return Err(HandoffError::QueueClosed);
        }
        Ok(())
    }
}

impl<F: FrontEnd, S: FrameSource> FrequencyProvider for Tuner<F, S> {
    fn next_frequency(&mut self) -> HandoffResult<f64> {
        let target_hz = self.uplink.get();

        if !self.frontend.retune(target_hz, self.lo_offset_hz) {
            error!("failed to set frequency to {}", target_hz);
            return Err(HandoffError::RetuneFailed { target_hz });
        }

        self.wait_for_backlog()?;
        Ok(target_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HopConfig;
    use crate::frame_source::FrameQueue;
    use crate::plan::FrequencyPlan;
    use crate::types::SpectrumFrame;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    struct RecordingFrontEnd {
        tuned: Vec<(f64, f64)>,
        accept: bool,
    }

    impl FrontEnd for RecordingFrontEnd {
        fn retune(&mut self, target_hz: f64, lo_offset_hz: f64) -> bool {
            self.tuned.push((target_hz, lo_offset_hz));
            self.accept
        }

        fn sample_rate(&self) -> f64 {
            1e6
        }

        fn gain_range(&self) -> (f64, f64) {
            (0.0, 10.0)
        }

        fn set_gain(&mut self, _gain_db: f64) {}
    }

    /// Source whose backlog flag is flipped by the test
    struct FlagSource {
        full: Arc<AtomicBool>,
    }

    impl FrameSource for FlagSource {
        fn receive(&self) -> HandoffResult<SpectrumFrame> {
            Err(HandoffError::QueueClosed)
        }

        fn is_backlog_full(&self) -> bool {
            self.full.load(Ordering::SeqCst)
        }
    }

    fn frontend(accept: bool) -> RecordingFrontEnd {
        RecordingFrontEnd {
            tuned: Vec::new(),
            accept,
        }
    }

    #[test]
    fn test_returns_current_uplink() {
        let mut plan = FrequencyPlan::new(940e6, HopConfig::default());
        let queue = FrameQueue::new(1);
        let mut tuner = Tuner::new(
            frontend(true),
            plan.uplink_handle(),
            queue,
            1e3,
            Duration::from_millis(10),
        );

        assert_eq!(tuner.next_frequency().unwrap(), 895e6);

        plan.advance(940e6);
        assert_eq!(tuner.next_frequency().unwrap(), 905e6);
        assert_eq!(tuner.frontend().tuned, vec![(895e6, 1e3), (905e6, 1e3)]);
    }

    #[test]
    fn test_retune_failure_is_fatal() {
        let plan = FrequencyPlan::new(940e6, HopConfig::default());
        let mut tuner = Tuner::new(
            frontend(false),
            plan.uplink_handle(),
            FrameQueue::new(1),
            0.0,
            Duration::from_millis(10),
        );

        assert_eq!(
            tuner.next_frequency(),
            Err(HandoffError::RetuneFailed { target_hz: 895e6 })
        );
    }

    #[test]
    fn test_blocks_while_backlog_full() {
        let plan = FrequencyPlan::new(940e6, HopConfig::default());
        let full = Arc::new(AtomicBool::new(true));
        let poll = Duration::from_millis(10);
        let mut tuner = Tuner::new(
            frontend(true),
            plan.uplink_handle(),
            FlagSource { full: full.clone() },
            0.0,
            poll,
        );

        let released = Arc::new(AtomicBool::new(false));
        let flag = full.clone();
        let released_at = released.clone();
        let drainer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            released_at.store(true, Ordering::SeqCst);
            flag.store(false, Ordering::SeqCst);
            Instant::now()
        });

        let freq = tuner.next_frequency().unwrap();
        let returned = Instant::now();
        assert!(released.load(Ordering::SeqCst), "returned while backlog full");
        assert_eq!(freq, 895e6);

        let drained = drainer.join().unwrap();
        // At most one poll interval past the drain, plus scheduling slack
        let lag = returned.duration_since(drained);
        assert!(
            lag <= poll + Duration::from_millis(15),
            "resumed {:?} after drain with a {:?} poll",
            lag,
            poll
        );
    }

    #[test]
    fn test_queue_backpressure() {
        let plan = FrequencyPlan::new(940e6, HopConfig::default());
        let queue = FrameQueue::new(1);
        queue.push(SpectrumFrame::uniform(895e6, 8, 1.0)).unwrap();

        let mut tuner = Tuner::new(
            frontend(true),
            plan.uplink_handle(),
            queue.clone(),
            0.0,
            Duration::from_millis(10),
        );

        let consumer = queue.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            consumer.receive().unwrap()
        });

        assert_eq!(tuner.next_frequency().unwrap(), 895e6);
        assert!(queue.is_empty());
        handle.join().unwrap();
    }

    #[test]
    fn test_closed_queue_releases_waiter() {
        let plan = FrequencyPlan::new(940e6, HopConfig::default());
        let queue = FrameQueue::new(1);
        queue.push(SpectrumFrame::uniform(895e6, 8, 1.0)).unwrap();

        let mut tuner = Tuner::new(
            frontend(true),
            plan.uplink_handle(),
            queue.clone(),
            0.0,
            Duration::from_millis(10),
        );

        let closer = queue.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.close();
        });

        assert_eq!(tuner.next_frequency(), Err(HandoffError::QueueClosed));
        handle.join().unwrap();
    }

    #[test]
    fn test_closure_provider() {
        let mut next = 0.0;
        let mut provider = move || -> HandoffResult<f64> {
            next += 1.0;
            Ok(next)
        };
        assert_eq!(FrequencyProvider::next_frequency(&mut provider).unwrap(), 1.0);
        assert_eq!(FrequencyProvider::next_frequency(&mut provider).unwrap(), 2.0);
    }
}
