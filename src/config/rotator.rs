//! # Rotator Configuration
//!
//! Process-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_DB_ACCOUNT_HOST, DEFAULT_DB_CONNECT_TIMEOUT_SECS, DEFAULT_PASSWORD_LENGTH,
    DEFAULT_STORE_TIMEOUT_SECS, MAX_DB_CONNECT_TIMEOUT_SECS, MAX_PASSWORD_LENGTH,
    MAX_STORE_TIMEOUT_SECS, MIN_PASSWORD_LENGTH,
};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be between {min} and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

/// Rotator configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct RotatorConfig {
    /// AWS region for Secrets Manager; the SDK default chain decides when unset
    pub region: Option<String>,
    /// Secrets Manager endpoint override (local mock servers)
    pub secrets_manager_endpoint: Option<String>,
    /// Database connect timeout (seconds)
    pub db_connect_timeout_secs: u64,
    /// Secrets Manager connect and operation timeout (seconds)
    pub store_timeout_secs: u64,
    /// Length of generated passwords
    pub password_length: usize,
    /// Host part of the MySQL account whose password is changed
    pub db_account_host: String,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            region: None,
            secrets_manager_endpoint: None,
            db_connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
            password_length: DEFAULT_PASSWORD_LENGTH,
            db_account_host: DEFAULT_DB_ACCOUNT_HOST.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl RotatorConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when a value is unparsable or out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when a value is unparsable or out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_format = match non_empty("LOG_FORMAT") {
            None => LogFormat::Json,
            Some(v) => match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "LOG_FORMAT",
                        value: v,
                        reason: "expected 'json' or 'text'".to_string(),
                    })
                }
            },
        };

        let config = Self {
            region: non_empty("AWS_REGION").or_else(|| non_empty("AWS_DEFAULT_REGION")),
            secrets_manager_endpoint: non_empty("SECRETS_MANAGER_ENDPOINT"),
            db_connect_timeout_secs: parse_or_default(
                "DB_CONNECT_TIMEOUT_SECS",
                non_empty("DB_CONNECT_TIMEOUT_SECS"),
                DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            )?,
            store_timeout_secs: parse_or_default(
                "STORE_TIMEOUT_SECS",
                non_empty("STORE_TIMEOUT_SECS"),
                DEFAULT_STORE_TIMEOUT_SECS,
            )?,
            password_length: parse_or_default(
                "PASSWORD_LENGTH",
                non_empty("PASSWORD_LENGTH"),
                DEFAULT_PASSWORD_LENGTH,
            )?,
            db_account_host: non_empty("DB_ACCOUNT_HOST")
                .unwrap_or_else(|| DEFAULT_DB_ACCOUNT_HOST.to_string()),
            log_level: non_empty("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check every bounded setting
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "DB_CONNECT_TIMEOUT_SECS",
            self.db_connect_timeout_secs,
            1,
            MAX_DB_CONNECT_TIMEOUT_SECS,
        )?;
        check_range(
            "STORE_TIMEOUT_SECS",
            self.store_timeout_secs,
            1,
            MAX_STORE_TIMEOUT_SECS,
        )?;
        check_range(
            "PASSWORD_LENGTH",
            self.password_length as u64,
            MIN_PASSWORD_LENGTH as u64,
            MAX_PASSWORD_LENGTH as u64,
        )?;
        Ok(())
    }

    /// Get database connect timeout duration
    #[must_use]
    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.db_connect_timeout_secs)
    }

    /// Get Secrets Manager timeout duration
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

fn parse_or_default<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => {
            let parsed = v.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value: v,
            })
        }
    }
}

fn check_range(key: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value,
            min,
            max,
        })
    }
}
