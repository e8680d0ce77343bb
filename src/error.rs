//! # Rotation Errors
//!
//! Error taxonomy surfaced to the rotation orchestrator.
//!
//! - Protocol violations (`UnknownStep`, `VersionNotFound`) are fatal and never retried here
//! - `TargetUnavailable` covers database connect and timeout failures
//! - `ValidationFailure` blocks progression to `finishSecret`
//! - `StoreConflict` is the secret store rejecting a racing version or stage write

use crate::config::ConfigError;
use crate::provider::StoreError;
use crate::target::TargetError;
use thiserror::Error;

/// Result type for rotation operations.
pub type Result<T> = std::result::Result<T, RotationError>;

/// Errors produced by a rotation step.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The step name is not one of the four protocol steps.
    #[error("Protocol violation: unknown rotation step '{step}'")]
    UnknownStep { step: String },

    /// A step expected a version that an earlier step should have created.
    #[error("Protocol violation: {selector} not found for secret {secret_id}")]
    VersionNotFound { secret_id: String, selector: String },

    /// The credential target could not be reached.
    #[error("Credential target unavailable: {message}")]
    TargetUnavailable { message: String },

    /// The pending credential did not prove itself against the target.
    #[error("Validation failed for secret {secret_id}: {reason}")]
    ValidationFailure { secret_id: String, reason: String },

    /// The secret store rejected a conflicting write.
    #[error("Secret store conflict: {message}")]
    StoreConflict { message: String },

    /// Any other secret store failure.
    #[error("Secret store error: {0}")]
    Store(StoreError),

    /// Any other credential target failure.
    #[error("Credential target error: {0}")]
    Target(TargetError),

    /// The secret payload is not a usable credential record.
    #[error("Invalid secret payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl RotationError {
    /// Create an unknown step error.
    pub fn unknown_step(step: impl Into<String>) -> Self {
        Self::UnknownStep { step: step.into() }
    }

    /// Create a validation failure.
    pub fn validation_failure(secret_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationFailure {
            secret_id: secret_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid payload error.
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            reason: reason.into(),
        }
    }

    /// True for contract violations between the orchestrator and the rotator.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::UnknownStep { .. } | Self::VersionNotFound { .. })
    }

    /// Whether an orchestrator-level retry of the same step can succeed.
    ///
    /// Protocol violations and malformed input need a human; everything
    /// else may clear on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !self.is_protocol_violation()
            && !matches!(self, Self::InvalidPayload { .. } | Self::Config(_))
    }

    /// Stable label used for metrics and structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownStep { .. } | Self::VersionNotFound { .. } => "protocol_violation",
            Self::TargetUnavailable { .. } => "target_unavailable",
            Self::ValidationFailure { .. } => "validation_failure",
            Self::StoreConflict { .. } => "store_conflict",
            Self::Store(_) => "store",
            Self::Target(_) => "target",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::Config(_) => "config",
        }
    }
}

impl From<StoreError> for RotationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound {
                secret_id,
                selector,
            } => Self::VersionNotFound {
                secret_id,
                selector,
            },
            StoreError::Conflict { message } => Self::StoreConflict { message },
            other => Self::Store(other),
        }
    }
}

impl From<TargetError> for RotationError {
    fn from(err: TargetError) -> Self {
        if err.is_unavailable() {
            Self::TargetUnavailable {
                message: err.to_string(),
            }
        } else {
            Self::Target(err)
        }
    }
}

impl From<serde_json::Error> for RotationError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_payload(err.to_string())
    }
}
