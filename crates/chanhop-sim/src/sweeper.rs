//! Simulated sampling pipeline
//!
//! Stands in for the receive chain that retunes the front-end once per
//! dwell and reports one power spectrum per dwell. Each cycle:
//!
//! 1. ask the [`FrequencyProvider`] where to go (this retunes and applies
//!    backpressure)
//! 2. wait out the tune delay
//! 3. collect `dwell_frames` spectra, max-holding each bin
//! 4. push the result into the frame queue
//!
//! A closed queue ends the sweep cleanly. Any other error closes the queue
//! so the consumer unblocks, and is returned from the sweep.

use crate::channel::SpectrumChannel;
use chanhop_core::error::{HandoffError, HandoffResult};
use chanhop_core::frame_source::FrameQueue;
use chanhop_core::tuning::FrequencyProvider;
use chanhop_core::types::SpectrumFrame;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

/// Sweep timing and FFT geometry
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Bins per frame
    pub fft_size: usize,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Pause after each retune
    pub tune_delay: Duration,
    /// Time spent collecting at each frequency
    pub dwell_delay: Duration,
    /// Spectra max-held into one reported frame
    pub dwell_frames: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            sample_rate: 1e6,
            tune_delay: Duration::ZERO,
            dwell_delay: Duration::ZERO,
            dwell_frames: 1,
        }
    }
}

/// Dwell loop feeding a [`FrameQueue`]
pub struct Sweeper<P> {
    provider: P,
    channel: SpectrumChannel,
    queue: FrameQueue,
    config: SweeperConfig,
    dwells: u64,
}

impl<P: FrequencyProvider + 'static> Sweeper<P> {
    pub fn new(provider: P, channel: SpectrumChannel, queue: FrameQueue, config: SweeperConfig) -> Self {
        Self {
            provider,
            channel,
            queue,
            config,
            dwells: 0,
        }
    }

    /// Completed dwells
    pub fn dwells(&self) -> u64 {
        self.dwells
    }

    /// Run one retune/collect/report cycle
    pub fn dwell(&mut self) -> HandoffResult<()> {
        let freq = self.provider.next_frequency()?;

        if !self.config.tune_delay.is_zero() {
            thread::sleep(self.config.tune_delay);
        }
        if !self.config.dwell_delay.is_zero() {
            thread::sleep(self.config.dwell_delay);
        }

        let frame = self.collect(freq);
        self.queue.push(frame)?;
        self.dwells += 1;
        Ok(())
    }

    fn collect(&mut self, freq: f64) -> SpectrumFrame {
        let frames = self.config.dwell_frames.max(1);
        let mut held = vec![0.0f64; self.config.fft_size];

        for _ in 0..frames {
            let frame = self
                .channel
                .generate(freq, self.config.fft_size, self.config.sample_rate);
            for (h, &m) in held.iter_mut().zip(frame.magnitudes()) {
                *h = h.max(m);
            }
        }

        SpectrumFrame::new(freq, held)
    }

    /// Sweep until the queue closes. Returns the number of dwells.
    pub fn run(mut self) -> HandoffResult<u64> {
        loop {
            match self.dwell() {
                Ok(()) => {}
                Err(HandoffError::QueueClosed) => {
                    debug!("sweeper stopping after {} dwells", self.dwells);
                    return Ok(self.dwells);
                }
                Err(e) => {
                    error!("sweeper failed: {}", e);
                    self.queue.close();
                    return Err(e);
                }
            }
        }
    }

    /// Run the sweep on its own thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<HandoffResult<u64>>> {
        thread::Builder::new()
            .name("sweeper".to_string())
            .spawn(move || self.run())
    }
}
