//! Fusion error types

use thiserror::Error;

/// Fusion-specific errors
#[derive(Debug, Error)]
pub enum FusionError {
    /// `start()` or `calibrate()` called after the sources were handed to the activities
    #[error("orchestrator already started; create a new instance to run again")]
    AlreadyStarted,

    /// Activities still running when the shutdown deadline passed
    #[error(
        "shutdown timed out after {timeout_ms} ms, still running: {}",
        .activities.join(", ")
    )]
    ShutdownTimeout {
        timeout_ms: u64,
        activities: Vec<String>,
    },

    /// Startup calibration could not finish
    #[error("calibration failed: {message}")]
    Calibration { message: String },

    /// Snapshot consumer went away
    #[error("snapshot channel closed")]
    SnapshotChannelClosed,
}

impl FusionError {
    pub fn calibration(message: impl Into<String>) -> Self {
        Self::Calibration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FusionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_timeout_names_activities() {
        let err = FusionError::ShutdownTimeout {
            timeout_ms: 2000,
            activities: vec!["scan".into(), "battery".into()],
        };
        assert_eq!(
            err.to_string(),
            "shutdown timed out after 2000 ms, still running: scan, battery"
        );
    }
}
