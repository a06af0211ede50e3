//! # Channel Hand-off Simulation
//!
//! Software stand-ins for everything `chanhop-core` treats as external: the
//! receiver, the spectrum pipeline, and the base station. Together they run
//! the full detect/hand-off loop without hardware.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐ next_frequency ┌─────────────┐ retune ┌──────────────┐
//! │ Sweeper       │ ─────────────▶ │ Tuner       │ ─────▶ │ SimFrontEnd  │
//! │ (dwell loop)  │                └─────────────┘        └──────────────┘
//! │               │ generate ┌─────────────────┐
//! │               │ ───────▶ │ SpectrumChannel │ noise floor + carriers
//! └───────────────┘          └─────────────────┘
//!         │ push
//!         ▼
//!   FrameQueue ──▶ HandoffController ──▶ SimBaseStation
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chanhop_sim::prelude::*;
//!
//! let channel = SpectrumChannel::new(
//!     SpectrumChannelConfig::ideal(-110.0).with_carrier(Carrier::new(895e6, 200e3, -70.0)),
//! );
//! let sweeper = Sweeper::new(tuner, channel, queue, SweeperConfig::default());
//! let handle = sweeper.spawn()?;
//! ```

pub mod basestation;
pub mod channel;
pub mod frontend;
pub mod sweeper;

// Re-exports
pub use basestation::{EventLog, LifecycleEvent, LifecycleOp, SimBaseStation};
pub use channel::{db_to_magnitude, Carrier, ChannelModel, SpectrumChannel, SpectrumChannelConfig};
pub use frontend::{SimFrontEnd, SimFrontEndConfig};
pub use sweeper::{Sweeper, SweeperConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::basestation::SimBaseStation;
    pub use crate::channel::{Carrier, ChannelModel, SpectrumChannel, SpectrumChannelConfig};
    pub use crate::frontend::SimFrontEnd;
    pub use crate::sweeper::{Sweeper, SweeperConfig};
}
