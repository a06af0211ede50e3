//! # Channel Hand-off Core
//!
//! Monitors the uplink band of a base station for competing transmissions
//! and moves the base station to another channel when the band stays busy.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐  SpectrumFrame  ┌────────────┐  power_db  ┌───────────┐
//! │ spectrum     │ ──────────────▶ │ band-power │ ─────────▶ │ CUSUM     │
//! │ pipeline     │   FrameQueue    │ estimator  │            │ detector  │
//! └──────────────┘                 └────────────┘            └───────────┘
//!        ▲                                                         │ trigger
//!        │ next_frequency()                                        ▼
//! ┌──────────────┐    UplinkHandle    ┌──────────────────────────────────┐
//! │ Tuner        │ ◀───────────────── │ HandoffController                │
//! │ (front-end)  │                    │ stop ▶ select next ▶ start (BTS) │
//! └──────────────┘                    └──────────────────────────────────┘
//! ```
//!
//! The radio driver, the FFT pipeline and the base station itself are
//! reached through the [`FrontEnd`], [`FrameSource`] and [`BaseStation`]
//! traits.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chanhop_core::prelude::*;
//!
//! let queue = FrameQueue::new(1);
//! let mut controller = HandoffController::new(
//!     queue.clone(),
//!     ScriptedBaseStation::default(),
//!     940e6,
//!     frontend.sample_rate(),
//!     DetectorConfig::default(),
//!     HopConfig::default(),
//! );
//! let tuner = Tuner::new(frontend, controller.uplink_handle(), queue, 0.0, poll);
//! // hand `tuner` to the spectrum pipeline, then:
//! controller.run()?;
//! ```

pub mod basestation;
pub mod config;
pub mod controller;
pub mod cusum;
pub mod error;
pub mod estimator;
pub mod frame_source;
pub mod frontend;
pub mod plan;
pub mod tuning;
pub mod types;

// Re-exports
pub use basestation::{BaseStation, ScriptedBaseStation};
pub use config::{parse_eng, ChanhopConfig, ConfigError, DetectorConfig, HopConfig, MonitorConfig};
pub use controller::{HandoffController, HandoffState, RunSummary};
pub use cusum::{CusumDecision, CusumDetector};
pub use error::{HandoffError, HandoffResult};
pub use estimator::{estimate, BandPowerEstimator};
pub use frame_source::{FrameQueue, FrameSource};
pub use frontend::{apply_gain, FrontEnd};
pub use plan::{arfcn_for_downlink, next_downlink, FrequencyPlan, UplinkHandle};
pub use tuning::{FrequencyProvider, Tuner};
pub use types::SpectrumFrame;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::basestation::{BaseStation, ScriptedBaseStation};
    pub use crate::config::{DetectorConfig, HopConfig, MonitorConfig};
    pub use crate::controller::HandoffController;
    pub use crate::frame_source::{FrameQueue, FrameSource};
    pub use crate::frontend::FrontEnd;
    pub use crate::tuning::{FrequencyProvider, Tuner};
    pub use crate::types::SpectrumFrame;
}
