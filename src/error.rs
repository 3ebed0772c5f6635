//! Error types for CLI detection and execution

use thiserror::Error;

/// Errors surfaced by detection pipelines and execution entry points.
///
/// Individual probe-step failures are never propagated as errors; a failing
/// step simply advances the pipeline to the next step. Only total pipeline
/// exhaustion (or API misuse) produces one of these.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Claude CLI not found: {reason}")]
    NotFound { reason: String },

    #[error("Execution subsystem not available: {reason}")]
    SubsystemUnavailable { reason: String },

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Execution failed: {reason}")]
    ExecutionFailed { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Execution timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("No successful detection yet: {reason}")]
    NotDetected { reason: String },
}

impl DetectError {
    /// The serializable error kind corresponding to this error.
    #[must_use]
    pub const fn kind(&self) -> crate::types::ErrorKind {
        use crate::types::ErrorKind;
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::SubsystemUnavailable { .. } => ErrorKind::SubsystemUnavailable,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::ExecutionFailed { .. } | Self::Timeout { .. } => ErrorKind::ExecutionFailed,
            Self::InvalidConfiguration { .. } | Self::NotDetected { .. } => {
                ErrorKind::InvalidConfiguration
            }
        }
    }
}
