//! # Logging
//!
//! `tracing` subscriber setup. `RUST_LOG` wins when set; otherwise the
//! configured `LOG_LEVEL` applies to this crate and `warn` to dependencies.

use crate::config::{LogFormat, RotatorConfig};
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Default filter directive for a log level
#[must_use]
pub fn default_directive(log_level: &str) -> String {
    format!("warn,db_secret_rotator={}", log_level.to_lowercase())
}

/// Install the global subscriber
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &RotatorConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Text => builder.with_ansi(false).try_init(),
    }
    .map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_scopes_level_to_crate() {
        assert_eq!(default_directive("DEBUG"), "warn,db_secret_rotator=debug");
    }
}
