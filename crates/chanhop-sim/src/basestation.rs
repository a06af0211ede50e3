//! Simulated base station
//!
//! Keeps the stored channel and running flag in memory and records every
//! lifecycle call, so tests can check the exact command sequence a
//! controller produced. Failures can be injected per operation.

use chanhop_core::basestation::BaseStation;
use chanhop_core::error::{HandoffError, HandoffResult};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// One recorded lifecycle call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ChannelWritten(i64),
    Started,
    Stopped,
}

/// Operation to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    WriteConfig,
    Start,
    Stop,
}

/// Shared view of the recorded events
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl EventLog {
    fn push(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Snapshot of the events so far
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Channels written, in order
    pub fn channels(&self) -> Vec<i64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LifecycleEvent::ChannelWritten(arfcn) => Some(arfcn),
                _ => None,
            })
            .collect()
    }
}

/// In-memory base station
#[derive(Debug, Default)]
pub struct SimBaseStation {
    log: EventLog,
    channel: Option<i64>,
    running: bool,
    fail_on: Option<LifecycleOp>,
}

impl SimBaseStation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call to `op`
    pub fn failing_on(mut self, op: LifecycleOp) -> Self {
        self.fail_on = Some(op);
        self
    }

    /// Handle to the event log that outlives moves of the station
    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    pub fn channel(&self) -> Option<i64> {
        self.channel
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn check(&self, op: LifecycleOp) -> HandoffResult<()> {
        if self.fail_on == Some(op) {
            let message = format!("injected {:?} failure", op);
            return Err(match op {
                LifecycleOp::WriteConfig => HandoffError::ConfigWriteFailed(message),
                LifecycleOp::Start | LifecycleOp::Stop => {
                    HandoffError::ExternalLifecycleFailed(message)
                }
            });
        }
        Ok(())
    }
}

impl BaseStation for SimBaseStation {
    fn write_channel_config(&mut self, arfcn: i64) -> HandoffResult<()> {
        if arfcn < 0 {
            return Err(HandoffError::NegativeChannelNumber {
                arfcn,
                down_hz: None,
            });
        }
        self.check(LifecycleOp::WriteConfig)?;
        self.channel = Some(arfcn);
        self.log.push(LifecycleEvent::ChannelWritten(arfcn));
        Ok(())
    }

    fn start(&mut self) -> HandoffResult<()> {
        self.check(LifecycleOp::Start)?;
        if self.running {
            return Err(HandoffError::ExternalLifecycleFailed(
                "already running".to_string(),
            ));
        }
        self.running = true;
        self.log.push(LifecycleEvent::Started);
        info!("simulated base station up on ARFCN {:?}", self.channel);
        Ok(())
    }

    fn stop(&mut self) -> HandoffResult<()> {
        self.check(LifecycleOp::Stop)?;
        if !self.running {
            return Err(HandoffError::ExternalLifecycleFailed(
                "not running".to_string(),
            ));
        }
        self.running = false;
        self.log.push(LifecycleEvent::Stopped);
        info!("simulated base station down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_sequence() {
        let mut bts = SimBaseStation::new();
        let log = bts.log();

        bts.write_channel_config(25).unwrap();
        bts.start().unwrap();
        assert!(bts.is_running());
        bts.stop().unwrap();
        bts.write_channel_config(75).unwrap();
        bts.start().unwrap();

        assert_eq!(
            log.events(),
            vec![
                LifecycleEvent::ChannelWritten(25),
                LifecycleEvent::Started,
                LifecycleEvent::Stopped,
                LifecycleEvent::ChannelWritten(75),
                LifecycleEvent::Started,
            ]
        );
        assert_eq!(log.channels(), vec![25, 75]);
        assert_eq!(bts.channel(), Some(75));
    }

    #[test]
    fn test_double_start_and_stray_stop() {
        let mut bts = SimBaseStation::new();
        assert!(bts.stop().is_err());
        bts.start().unwrap();
        assert!(bts.start().is_err());
    }

    #[test]
    fn test_negative_channel() {
        let mut bts = SimBaseStation::new();
        assert_eq!(
            bts.write_channel_config(-1),
            Err(HandoffError::NegativeChannelNumber {
                arfcn: -1,
                down_hz: None
            })
        );
        assert!(bts.log().events().is_empty());
    }

    #[test]
    fn test_injected_failures() {
        let mut bts = SimBaseStation::new().failing_on(LifecycleOp::WriteConfig);
        assert!(matches!(
            bts.write_channel_config(1),
            Err(HandoffError::ConfigWriteFailed(_))
        ));

        let mut bts = SimBaseStation::new().failing_on(LifecycleOp::Start);
        assert!(matches!(
            bts.start(),
            Err(HandoffError::ExternalLifecycleFailed(_))
        ));
        assert!(!bts.is_running());
    }
}
