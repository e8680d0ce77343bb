//! # Secret Retrieval
//!
//! Ad-hoc read of a secret's current document, for operators checking what
//! a rotation produced.

use crate::error::Result;
use crate::provider::SecretStore;
use crate::secret::VersionSelector;
use tracing::debug;

/// Fetch the `AWSCURRENT` version of a secret as JSON
///
/// `SecretString` content is parsed directly; `SecretBinary` content is
/// base64-decoded first.
///
/// # Errors
///
/// Store failures, or `InvalidPayload` when the content is not JSON.
pub async fn get_secret_json(store: &dyn SecretStore, secret_id: &str) -> Result<serde_json::Value> {
    let value = store
        .get_secret_value(secret_id, &VersionSelector::current())
        .await?;
    debug!(
        secret.id = secret_id,
        token = value.token.as_str(),
        "Fetched current secret version"
    );
    Ok(serde_json::from_slice(&value.content.json_bytes())?)
}
