//! # Secret Version Model
//!
//! Types describing a secret's version graph as seen by the rotator:
//! staging labels, the token → labels map, version selectors and raw
//! secret values.

pub mod password;
pub mod payload;

use crate::constants::{STAGE_CURRENT, STAGE_PENDING, STAGE_PREVIOUS};
use base64::Engine;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use zeroize::Zeroizing;

pub use password::PasswordGenerator;
pub use payload::{AdminCredentials, CredentialPayload};

/// Staging label attached to a secret version
///
/// Each label is attached to at most one version of a secret at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageLabel {
    /// `AWSCURRENT` - the live credential
    Current,
    /// `AWSPENDING` - the credential under rotation
    Pending,
    /// `AWSPREVIOUS` - the credential displaced by the last rotation
    Previous,
    /// Any other label; carried through untouched
    Custom(String),
}

impl StageLabel {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            StageLabel::Current => STAGE_CURRENT,
            StageLabel::Pending => STAGE_PENDING,
            StageLabel::Previous => STAGE_PREVIOUS,
            StageLabel::Custom(label) => label,
        }
    }
}

impl From<&str> for StageLabel {
    fn from(label: &str) -> Self {
        match label {
            STAGE_CURRENT => StageLabel::Current,
            STAGE_PENDING => StageLabel::Pending,
            STAGE_PREVIOUS => StageLabel::Previous,
            other => StageLabel::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for StageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version token → staging labels, as returned by `DescribeSecret`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionStages(BTreeMap<String, BTreeSet<StageLabel>>);

impl VersionStages {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the wire representation (`VersionIdsToStages`)
    pub fn from_wire<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<S>)>,
        S: AsRef<str>,
    {
        let map = entries
            .into_iter()
            .map(|(token, labels)| {
                let labels = labels
                    .iter()
                    .map(|label| StageLabel::from(label.as_ref()))
                    .collect();
                (token, labels)
            })
            .collect();
        Self(map)
    }

    /// Record a version with the given labels, replacing any previous entry
    pub fn insert(&mut self, token: impl Into<String>, labels: impl IntoIterator<Item = StageLabel>) {
        self.0.insert(token.into(), labels.into_iter().collect());
    }

    #[must_use]
    pub fn contains_token(&self, token: &str) -> bool {
        self.0.contains_key(token)
    }

    #[must_use]
    pub fn stages_of(&self, token: &str) -> Option<&BTreeSet<StageLabel>> {
        self.0.get(token)
    }

    #[must_use]
    pub fn has_stage(&self, token: &str, stage: &StageLabel) -> bool {
        self.0.get(token).is_some_and(|labels| labels.contains(stage))
    }

    /// Token of the version currently holding `stage`, if any
    #[must_use]
    pub fn token_with_stage(&self, stage: &StageLabel) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, labels)| labels.contains(stage))
            .map(|(token, _)| token.as_str())
    }

    /// Number of versions carrying `stage`
    #[must_use]
    pub fn count_with_stage(&self, stage: &StageLabel) -> usize {
        self.0.values().filter(|labels| labels.contains(stage)).count()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which version of a secret to read
///
/// With both fields set the version must carry the stage, matching
/// `GetSecretValue` called with both `VersionId` and `VersionStage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSelector {
    pub token: Option<String>,
    pub stage: Option<StageLabel>,
}

impl VersionSelector {
    /// The version labelled `AWSCURRENT`
    #[must_use]
    pub fn current() -> Self {
        Self {
            token: None,
            stage: Some(StageLabel::Current),
        }
    }

    /// The version identified by `token`, which must be labelled `AWSPENDING`
    pub fn pending(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            stage: Some(StageLabel::Pending),
        }
    }

    /// The version identified by `token`, whatever its labels
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            stage: None,
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.token, &self.stage) {
            (Some(token), Some(stage)) => write!(f, "version {token} ({stage})"),
            (Some(token), None) => write!(f, "version {token}"),
            (None, Some(stage)) => write!(f, "{stage} version"),
            (None, None) => f.write_str("latest version"),
        }
    }
}

/// Secret material of one version
pub enum SecretContent {
    /// `SecretString`
    Text(Zeroizing<String>),
    /// `SecretBinary`
    Binary(Zeroizing<Vec<u8>>),
}

impl fmt::Debug for SecretContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretContent::Text(_) => f.write_str("Text(<redacted>)"),
            SecretContent::Binary(bytes) => write!(f, "Binary(<{} bytes redacted>)", bytes.len()),
        }
    }
}

impl SecretContent {
    /// Bytes of the JSON document held by this version
    ///
    /// Binary secrets are expected to hold base64 text; raw bytes are used
    /// as-is when they do not decode.
    #[must_use]
    pub fn json_bytes(&self) -> Zeroizing<Vec<u8>> {
        match self {
            SecretContent::Text(text) => Zeroizing::new(text.as_bytes().to_vec()),
            SecretContent::Binary(bytes) => {
                let trimmed = bytes.trim_ascii();
                match base64::engine::general_purpose::STANDARD.decode(trimmed) {
                    Ok(decoded) => Zeroizing::new(decoded),
                    Err(_) => Zeroizing::new(bytes.to_vec()),
                }
            }
        }
    }
}

/// A secret version as returned by `GetSecretValue`
#[derive(Debug)]
pub struct SecretValue {
    /// Version id (the client request token that created it)
    pub token: String,
    pub content: SecretContent,
}

impl SecretValue {
    pub fn text(token: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            content: SecretContent::Text(Zeroizing::new(text.into())),
        }
    }

    pub fn binary(token: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            token: token.into(),
            content: SecretContent::Binary(Zeroizing::new(bytes)),
        }
    }
}
