//! # Configuration
//!
//! Environment-driven configuration for the rotator process.

mod rotator;

pub use rotator::{ConfigError, LogFormat, RotatorConfig};
