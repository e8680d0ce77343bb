//! # Credential Targets
//!
//! A credential target is the system whose live authentication secret is
//! rotated. The coordinator opens one short-lived connection per step,
//! changes or probes the credential, and always closes it again.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

pub mod mysql;

pub use mysql::MySqlTarget;

/// Errors returned by a credential target.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The target could not be reached.
    #[error("Connection failed: {message}")]
    Unavailable { message: String },

    /// Connecting did not finish within the configured bound.
    #[error("Connection timed out after {timeout_secs}s")]
    ConnectTimeout { timeout_secs: u64 },

    /// The target rejected the supplied credentials.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The statement form is not understood by this target version.
    #[error("Unsupported statement syntax: {message}")]
    UnsupportedSyntax { message: String },

    /// Any other statement failure.
    #[error("Query failed: {message}")]
    Query { message: String },

    /// The values cannot be embedded safely in a statement.
    #[error("Invalid statement input: {message}")]
    InvalidInput { message: String },
}

impl TargetError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    pub fn unsupported_syntax(message: impl Into<String>) -> Self {
        Self::UnsupportedSyntax {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Connect-level failure: the target was never reached
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::ConnectTimeout { .. })
    }

    /// The anticipated failure that lets a credential change fall back to
    /// the next statement form
    #[must_use]
    pub fn is_unsupported_syntax(&self) -> bool {
        matches!(self, Self::UnsupportedSyntax { .. })
    }
}

/// Where and as whom to connect
#[derive(Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub dbname: Option<String>,
    pub username: String,
    pub password: Zeroizing<String>,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Statement forms for changing an account password, in preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeForm {
    /// `ALTER USER ... IDENTIFIED BY ...`
    AlterUser,
    /// `SET PASSWORD FOR ... = PASSWORD(...)` for servers without `ALTER USER`
    SetPassword,
}

impl ChangeForm {
    /// Candidates tried in order until one is accepted
    pub const CANDIDATES: [ChangeForm; 2] = [ChangeForm::AlterUser, ChangeForm::SetPassword];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeForm::AlterUser => "alter_user",
            ChangeForm::SetPassword => "set_password",
        }
    }
}

/// One password change request
#[derive(Clone)]
pub struct CredentialChange<'a> {
    pub form: ChangeForm,
    pub username: &'a str,
    /// Host part of the account (`'user'@'host'`)
    pub account_host: &'a str,
    pub password: &'a str,
}

impl fmt::Debug for CredentialChange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialChange")
            .field("form", &self.form)
            .field("username", &self.username)
            .field("account_host", &self.account_host)
            .finish_non_exhaustive()
    }
}

/// System whose credentials are rotated
#[async_trait]
pub trait CredentialTarget: Send + Sync {
    /// Open a connection, giving up after `timeout`
    async fn connect(
        &self,
        params: &ConnectParams,
        timeout: Duration,
    ) -> Result<Box<dyn TargetConnection>, TargetError>;
}

/// One open connection to a credential target
#[async_trait]
pub trait TargetConnection: Send {
    /// Change an account's password using the given statement form
    async fn change_credential(&mut self, change: &CredentialChange<'_>) -> Result<(), TargetError>;

    /// Run the liveness query and return the values of its rows
    async fn liveness_probe(&mut self) -> Result<Vec<i64>, TargetError>;

    /// Commit the work done on this connection
    async fn commit(&mut self) -> Result<(), TargetError>;

    /// Release the connection; failures are logged, never returned
    async fn close(self: Box<Self>);
}
