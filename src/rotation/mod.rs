//! # Rotation
//!
//! The four-step rotation protocol: step parsing, the coordinator that runs
//! a step, and the credential change fallback used by `setSecret`.

pub mod coordinator;
pub mod credential_change;
pub mod step;

pub use coordinator::{RotationCoordinator, StepOutcome};
pub use credential_change::apply_credential_change;
pub use step::{RotationEvent, RotationStep};
