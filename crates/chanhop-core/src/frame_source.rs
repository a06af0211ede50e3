//! Frame source boundary and bounded frame queue
//!
//! The spectrum pipeline pushes one [`SpectrumFrame`] per dwell into a
//! [`FrameQueue`]; the controller pulls them in arrival order. The queue has a
//! fixed capacity so the pipeline's tuning callback can hold off retuning
//! until the controller has caught up.
//!
//! ```text
//!   sweeper ──push──▶ [ FrameQueue (cap N) ] ──receive──▶ controller
//!      ▲                     │
//!      └── wait_for_capacity ┘
//! ```

use crate::error::{HandoffError, HandoffResult};
use crate::types::SpectrumFrame;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Consumer side of the spectrum pipeline
pub trait FrameSource: Send + Sync {
    /// Block until the next frame is available.
    ///
    /// Returns `QueueClosed` once the source has been shut down.
    fn receive(&self) -> HandoffResult<SpectrumFrame>;

    /// True while the backlog is at capacity
    fn is_backlog_full(&self) -> bool;

    /// True once the source has been shut down
    fn is_closed(&self) -> bool {
        false
    }

    /// Wait up to `timeout` for the backlog to drop below capacity.
    ///
    /// Returns true if there is room afterwards.
    fn wait_for_capacity(&self, timeout: Duration) -> bool {
        if self.is_backlog_full() {
            std::thread::sleep(timeout);
        }
        !self.is_backlog_full()
    }
}

#[derive(Debug)]
struct QueueState {
    frames: VecDeque<SpectrumFrame>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// Bounded multi-producer frame queue.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    shared: Arc<Shared>,
}

impl FrameQueue {
    /// Queue holding at most `capacity` frames (minimum one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    frames: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Frames currently queued
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// Append a frame, blocking while the queue is full
    pub fn push(&self, frame: SpectrumFrame) -> HandoffResult<()> {
        let mut state = self.lock();
        while !state.closed && state.frames.len() >= self.shared.capacity {
            state = self
                .shared
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return Err(HandoffError::QueueClosed);
        }

        state.frames.push_back(frame);
        drop(state);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Shut the queue down, waking every waiter.
    ///
    /// Queued frames are dropped; later pushes and receives fail.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.frames.clear();
        drop(state);
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
    }
}

impl FrameSource for FrameQueue {
    fn receive(&self) -> HandoffResult<SpectrumFrame> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(HandoffError::QueueClosed);
            }
            if let Some(frame) = state.frames.pop_front() {
                drop(state);
                self.shared.not_full.notify_all();
                return Ok(frame);
            }
            state = self
                .shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn is_backlog_full(&self) -> bool {
        self.lock().frames.len() >= self.shared.capacity
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn wait_for_capacity(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .shared
            .not_full
            .wait_timeout_while(state, timeout, |s| {
                !s.closed && s.frames.len() >= self.shared.capacity
            })
            .unwrap_or_else(PoisonError::into_inner);
        !state.closed && state.frames.len() < self.shared.capacity
    }
}
