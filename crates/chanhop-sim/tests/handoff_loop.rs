//! End-to-end hand-off runs against the simulated radio and base station

use chanhop_core::config::{DetectorConfig, HopConfig};
use chanhop_core::controller::HandoffController;
use chanhop_core::error::HandoffError;
use chanhop_core::frame_source::FrameQueue;
use chanhop_core::tuning::Tuner;
use chanhop_sim::basestation::{EventLog, LifecycleEvent, SimBaseStation};
use chanhop_sim::channel::{Carrier, SpectrumChannel, SpectrumChannelConfig};
use chanhop_sim::frontend::{SimFrontEnd, SimFrontEndConfig};
use chanhop_sim::sweeper::{Sweeper, SweeperConfig};
use std::thread;
use std::time::{Duration, Instant};

const RATE: f64 = 1e6;
const INITIAL_DOWN: f64 = 940e6;

fn detector() -> DetectorConfig {
    DetectorConfig {
        half_width_bins: 2,
        ..Default::default()
    }
}

fn hop() -> HopConfig {
    HopConfig {
        settle_delay: Duration::ZERO,
        backlog_poll_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

fn sweeper_config() -> SweeperConfig {
    SweeperConfig {
        fft_size: 256,
        sample_rate: RATE,
        ..Default::default()
    }
}

fn channel_with(uplinks: &[f64]) -> SpectrumChannel {
    let config = uplinks.iter().fold(SpectrumChannelConfig::ideal(-110.0), |c, &f| {
        c.with_carrier(Carrier::new(f, 200e3, -70.0))
    });
    SpectrumChannel::new(config)
}

struct Rig {
    queue: FrameQueue,
    log: EventLog,
    controller: HandoffController<FrameQueue, SimBaseStation>,
    sweeper: thread::JoinHandle<Result<u64, HandoffError>>,
}

fn rig(channel: SpectrumChannel, frontend: SimFrontEnd) -> Rig {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let queue = FrameQueue::new(1);
    let bts = SimBaseStation::new();
    let log = bts.log();

    let controller =
        HandoffController::new(queue.clone(), bts, INITIAL_DOWN, RATE, detector(), hop());
    let tuner = Tuner::new(
        frontend,
        controller.uplink_handle(),
        queue.clone(),
        0.0,
        hop().backlog_poll_interval,
    );
    let sweeper = Sweeper::new(tuner, channel, queue.clone(), sweeper_config())
        .spawn()
        .unwrap();

    Rig {
        queue,
        log,
        controller,
        sweeper,
    }
}

fn wait_for_events(log: &EventLog, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while log.events().len() < count {
        assert!(Instant::now() < deadline, "stalled at {:?}", log.events());
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_occupied_channels_alternate() {
    let Rig {
        queue,
        log,
        controller,
        sweeper,
    } = rig(channel_with(&[895e6, 905e6]), SimFrontEnd::default());
    let mut controller = controller.with_max_handoffs(3);

    let summary = controller.run().unwrap();
    queue.close();
    sweeper.join().unwrap().unwrap();

    assert_eq!(summary.handoffs, 3);
    assert_eq!(
        log.events(),
        vec![
            LifecycleEvent::ChannelWritten(25),
            LifecycleEvent::Started,
            LifecycleEvent::Stopped,
            LifecycleEvent::ChannelWritten(75),
            LifecycleEvent::Started,
            LifecycleEvent::Stopped,
            LifecycleEvent::ChannelWritten(25),
            LifecycleEvent::Started,
            LifecycleEvent::Stopped,
            LifecycleEvent::ChannelWritten(75),
            LifecycleEvent::Started,
        ]
    );
    // Three hops from 940 MHz land on 950 MHz
    assert_eq!(controller.plan().down_hz(), 950e6);
    assert_eq!(controller.plan().up_hz(), 905e6);
    assert!(controller.base_station().is_running());
}

#[test]
fn test_quiet_destination_holds() {
    let Rig {
        queue,
        log,
        mut controller,
        sweeper,
    } = rig(channel_with(&[895e6]), SimFrontEnd::default());

    let closer = thread::spawn(move || {
        wait_for_events(&log, 5);
        // Give the detector time to see plenty of quiet frames
        thread::sleep(Duration::from_millis(200));
        queue.close();
        log
    });

    let summary = controller.run().unwrap();
    let log = closer.join().unwrap();
    sweeper.join().unwrap().unwrap();

    assert_eq!(summary.handoffs, 1);
    assert_eq!(log.channels(), vec![25, 75]);
    assert!(summary.frames_processed > 3);
    assert_eq!(controller.plan().up_hz(), 905e6);
}

#[test]
fn test_retune_failure_ends_both_sides() {
    let frontend = SimFrontEnd::new(SimFrontEndConfig {
        max_frequency: 900e6,
        ..Default::default()
    });
    let Rig {
        log,
        mut controller,
        sweeper,
        ..
    } = rig(channel_with(&[895e6, 905e6]), frontend);

    let summary = controller.run().unwrap();
    let swept = sweeper.join().unwrap();

    assert_eq!(swept, Err(HandoffError::RetuneFailed { target_hz: 905e6 }));
    assert_eq!(summary.handoffs, 1);
    assert_eq!(log.channels(), vec![25, 75]);
}
