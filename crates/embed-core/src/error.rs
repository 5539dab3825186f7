use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::FailureCause;

/// Broad error category used for user-facing handling and retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmbedErrorCategory {
    /// Invalid input such as a malformed target URL.
    Config,
    /// Transient network or transport failure.
    Network,
    /// An attempt did not complete before its deadline.
    Timeout,
    /// A cross-origin message violated the contract.
    Protocol,
    /// The host platform refused an operation.
    Platform,
    /// Internal bug or invariant break.
    Internal,
}

impl EmbedErrorCategory {
    /// Categories the state machine absorbs by retrying.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }
}

/// Stable error payload emitted across the command/event boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct EmbedError {
    /// High-level error category.
    pub category: EmbedErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl EmbedError {
    /// Construct a new error.
    pub fn new(
        category: EmbedErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build the error returned for an unusable target URL.
    pub fn invalid_target(url: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            EmbedErrorCategory::Config,
            "invalid_target_url",
            format!("cannot embed '{url}': {reason}"),
        )
    }

    /// Build the error describing a failed load attempt.
    pub fn attempt_failed(cause: FailureCause) -> Self {
        let (category, code) = match cause {
            FailureCause::Timeout => (EmbedErrorCategory::Timeout, "load_timeout"),
            FailureCause::FrameError => (EmbedErrorCategory::Network, "frame_load_error"),
            FailureCause::Reported => (EmbedErrorCategory::Network, "content_reported_error"),
            FailureCause::HostRejected => (EmbedErrorCategory::Platform, "frame_load_rejected"),
        };
        Self::new(category, code, format!("load attempt failed: {cause:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_invalid_target_error_code_stable() {
        let err = EmbedError::invalid_target("ftp://nope", "unsupported scheme");
        assert_eq!(err.code, "invalid_target_url");
        assert_eq!(err.category, EmbedErrorCategory::Config);
        assert!(err.message.contains("ftp://nope"));
    }

    #[test]
    fn maps_failure_causes_to_categories() {
        assert_eq!(
            EmbedError::attempt_failed(FailureCause::Timeout).category,
            EmbedErrorCategory::Timeout
        );
        assert_eq!(
            EmbedError::attempt_failed(FailureCause::Reported).code,
            "content_reported_error"
        );
        assert!(
            !EmbedError::attempt_failed(FailureCause::HostRejected)
                .category
                .is_transient()
        );
        assert!(EmbedErrorCategory::Timeout.is_transient());
    }
}
