//! # Secret Store Providers
//!
//! The rotator only needs four operations from a secret store: describe the
//! version graph, read a version, write a new version, and move a staging
//! label. `SecretStore` captures exactly those so the coordinator can run
//! against AWS Secrets Manager in production and an in-memory store in tests.

use crate::secret::{SecretValue, StageLabel, VersionSelector, VersionStages};
use async_trait::async_trait;
use thiserror::Error;

pub mod aws;

pub use aws::AwsSecretsManagerStore;

/// Errors returned by a secret store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The secret or the selected version does not exist.
    #[error("{selector} not found for secret {secret_id}")]
    NotFound { secret_id: String, selector: String },

    /// A write raced with, or contradicts, an existing version or label.
    #[error("Conflicting write: {message}")]
    Conflict { message: String },

    /// The store could not be reached or timed out.
    #[error("Secret store unavailable: {message}")]
    Unavailable { message: String },

    /// The store rejected the request as malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Any other backend failure.
    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn not_found(secret_id: impl Into<String>, selector: impl ToString) -> Self {
        Self::NotFound {
            secret_id: secret_id.into(),
            selector: selector.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Versioned secret store
///
/// Implementations must not log secret values.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Version token → staging labels for the secret
    async fn describe_secret(&self, secret_id: &str) -> Result<VersionStages, StoreError>;

    /// Read one version of the secret
    async fn get_secret_value(
        &self,
        secret_id: &str,
        selector: &VersionSelector,
    ) -> Result<SecretValue, StoreError>;

    /// Write a new version identified by `token` and attach `stages` to it
    ///
    /// Repeating the call with the same token and content is a no-op; the
    /// same token with different content is a `Conflict`.
    async fn put_secret_value(
        &self,
        secret_id: &str,
        token: &str,
        secret_string: &str,
        stages: &[StageLabel],
    ) -> Result<(), StoreError>;

    /// Atomically attach `stage` to `move_to_token`
    ///
    /// `remove_from_token` names the version currently holding the label.
    /// Moving `AWSCURRENT` tags the displaced version `AWSPREVIOUS`.
    async fn update_secret_version_stage(
        &self,
        secret_id: &str,
        stage: &StageLabel,
        move_to_token: &str,
        remove_from_token: Option<&str>,
    ) -> Result<(), StoreError>;
}
