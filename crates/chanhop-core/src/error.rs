//! Error types for the monitor and hand-off loop
//!
//! Estimator errors are recovered per frame. Everything else is fatal and
//! propagates to the binary, which exits with the diagnostic.

/// Result type for monitor and hand-off operations
pub type HandoffResult<T> = Result<T, HandoffError>;

/// Errors that can occur while monitoring a channel or handing it off
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandoffError {
    #[error("band [{low}, {high}] outside frame of {bin_count} bins")]
    OutOfRange {
        low: i64,
        high: i64,
        bin_count: usize,
    },

    #[error("invalid band power: mean magnitude {0} has no finite dB value")]
    InvalidPower(f64),

    #[error("front-end rejected retune to {target_hz} Hz")]
    RetuneFailed { target_hz: f64 },

    #[error("external system lifecycle command failed: {0}")]
    ExternalLifecycleFailed(String),

    #[error("failed to persist channel selection: {0}")]
    ConfigWriteFailed(String),

    /// `down_hz` is the downlink the channel was derived from, when known
    #[error("ARFCN must be >= 0, got {arfcn}")]
    NegativeChannelNumber { arfcn: i64, down_hz: Option<f64> },

    #[error("frame source closed")]
    QueueClosed,
}

impl HandoffError {
    /// True for errors that only invalidate the current frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HandoffError::OutOfRange { .. } | HandoffError::InvalidPower(_)
        )
    }
}

impl From<rusqlite::Error> for HandoffError {
    fn from(err: rusqlite::Error) -> Self {
        HandoffError::ConfigWriteFailed(err.to_string())
    }
}
