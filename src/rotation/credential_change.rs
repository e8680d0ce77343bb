//! # Credential Change Fallback
//!
//! Password changes are attempted with each statement form in
//! `ChangeForm::CANDIDATES` order. Only an unsupported-syntax failure moves
//! on to the next form; every other error is returned immediately.

use crate::observability::metrics;
use crate::target::{ChangeForm, CredentialChange, TargetConnection, TargetError};
use tracing::{debug, warn};

/// Change `username`'s password, returning the statement form that succeeded
///
/// # Errors
///
/// Returns the first error that is not an unsupported-syntax failure, or the
/// last syntax failure when no form is accepted.
pub async fn apply_credential_change(
    conn: &mut dyn TargetConnection,
    username: &str,
    account_host: &str,
    password: &str,
) -> Result<ChangeForm, TargetError> {
    let mut last_error = None;

    for form in ChangeForm::CANDIDATES {
        let change = CredentialChange {
            form,
            username,
            account_host,
            password,
        };

        match conn.change_credential(&change).await {
            Ok(()) => {
                if last_error.is_some() {
                    metrics::increment_credential_change_fallbacks();
                }
                debug!(form = form.as_str(), username = username, "Credential change accepted");
                return Ok(form);
            }
            Err(e) if e.is_unsupported_syntax() => {
                warn!(
                    form = form.as_str(),
                    username = username,
                    error = %e,
                    "Credential change statement not supported by target, trying next form"
                );
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error
        .unwrap_or_else(|| TargetError::unsupported_syntax("no credential change statement form")))
}
