//! DB Secret Rotator Library
//!
//! Rotates a MySQL account password held in AWS Secrets Manager using the
//! four-step rotation protocol (`createSecret`, `setSecret`, `testSecret`,
//! `finishSecret`). The secret store and the database are injected as trait
//! objects so tests can run the protocol against in-memory fakes.

pub mod config;
pub mod constants;
pub mod error;
pub mod observability;
pub mod provider;
pub mod retrieval;
pub mod rotation;
pub mod secret;
pub mod target;

pub use error::{Result, RotationError};
pub use rotation::{RotationCoordinator, RotationEvent, RotationStep, StepOutcome};
