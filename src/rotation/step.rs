//! # Rotation Steps
//!
//! The four protocol steps and the invocation record that names one of them.

use crate::error::{Result, RotationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One step of the rotation protocol, in protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationStep {
    /// Generate a new credential and store it as `AWSPENDING`
    CreateSecret,
    /// Apply the pending credential to the database
    SetSecret,
    /// Prove the pending credential works
    TestSecret,
    /// Promote the pending version to `AWSCURRENT`
    FinishSecret,
}

impl RotationStep {
    /// All steps in the order a rotation attempt runs them
    pub const ALL: [RotationStep; 4] = [
        RotationStep::CreateSecret,
        RotationStep::SetSecret,
        RotationStep::TestSecret,
        RotationStep::FinishSecret,
    ];

    /// Wire name of the step
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationStep::CreateSecret => "createSecret",
            RotationStep::SetSecret => "setSecret",
            RotationStep::TestSecret => "testSecret",
            RotationStep::FinishSecret => "finishSecret",
        }
    }
}

impl FromStr for RotationStep {
    type Err = RotationError;

    fn from_str(step: &str) -> Result<Self> {
        match step {
            "createSecret" => Ok(RotationStep::CreateSecret),
            "setSecret" => Ok(RotationStep::SetSecret),
            "testSecret" => Ok(RotationStep::TestSecret),
            "finishSecret" => Ok(RotationStep::FinishSecret),
            other => Err(RotationError::unknown_step(other)),
        }
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invocation record sent by the rotation scheduler
///
/// ```json
/// {"SecretId": "arn:aws:secretsmanager:...", "ClientRequestToken": "...", "Step": "createSecret"}
/// ```
///
/// `Step` stays a plain string here so that an unrecognised name surfaces as
/// a protocol violation rather than a decoding error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEvent {
    #[serde(rename = "SecretId")]
    pub secret_id: String,
    #[serde(rename = "ClientRequestToken")]
    pub client_request_token: String,
    #[serde(rename = "Step")]
    pub step: String,
}

impl RotationEvent {
    pub fn new(
        secret_id: impl Into<String>,
        client_request_token: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        Self {
            secret_id: secret_id.into(),
            client_request_token: client_request_token.into(),
            step: step.into(),
        }
    }

    /// Decode an invocation record from JSON
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` when the record is malformed.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| RotationError::invalid_payload(format!("invalid rotation event: {e}")))
    }

    /// The requested step
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` for any name outside the four protocol steps.
    pub fn step(&self) -> Result<RotationStep> {
        self.step.parse()
    }
}
