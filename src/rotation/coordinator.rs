//! # Rotation Coordinator
//!
//! Runs one rotation step per invocation against an injected secret store
//! and credential target.
//!
//! ```text
//! createSecret  CURRENT ──copy, new password──▶ PENDING(token)
//! setSecret     admin login ──ALTER USER / SET PASSWORD──▶ database
//! testSecret    pending login ──SELECT 1──▶ database
//! finishSecret  CURRENT ──▶ token, displaced version ──▶ PREVIOUS
//! ```
//!
//! Each step is idempotent for a given token. Ordering between steps is the
//! orchestrator's job; the coordinator keeps no state between invocations.

use crate::config::RotatorConfig;
use crate::constants::{DEFAULT_DB_ACCOUNT_HOST, DEFAULT_DB_CONNECT_TIMEOUT_SECS};
use crate::error::{Result, RotationError};
use crate::observability::metrics;
use crate::provider::SecretStore;
use crate::rotation::credential_change::apply_credential_change;
use crate::rotation::step::{RotationEvent, RotationStep};
use crate::secret::payload::with_new_password;
use crate::secret::{CredentialPayload, PasswordGenerator, StageLabel, VersionSelector};
use crate::target::{ChangeForm, CredentialTarget, TargetConnection, TargetError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn, Instrument};

/// Result of a successful step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step did its work
    Completed,
    /// An earlier invocation with the same token already did the work
    AlreadyCompleted,
}

impl StepOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Completed => "completed",
            StepOutcome::AlreadyCompleted => "already_completed",
        }
    }
}

/// Rotation coordinator
pub struct RotationCoordinator {
    store: Arc<dyn SecretStore>,
    target: Arc<dyn CredentialTarget>,
    passwords: PasswordGenerator,
    connect_timeout: Duration,
    account_host: String,
}

impl std::fmt::Debug for RotationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationCoordinator")
            .field("password_length", &self.passwords.length())
            .field("connect_timeout", &self.connect_timeout)
            .field("account_host", &self.account_host)
            .finish_non_exhaustive()
    }
}

impl RotationCoordinator {
    /// Create a coordinator with default settings
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>, target: Arc<dyn CredentialTarget>) -> Self {
        Self {
            store,
            target,
            passwords: PasswordGenerator::default(),
            connect_timeout: Duration::from_secs(DEFAULT_DB_CONNECT_TIMEOUT_SECS),
            account_host: DEFAULT_DB_ACCOUNT_HOST.to_string(),
        }
    }

    /// Create a coordinator from process configuration
    ///
    /// # Errors
    ///
    /// Returns `Config` when a bounded setting is out of range.
    pub fn from_config(
        store: Arc<dyn SecretStore>,
        target: Arc<dyn CredentialTarget>,
        config: &RotatorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            target,
            passwords: PasswordGenerator::new(config.password_length),
            connect_timeout: config.db_connect_timeout(),
            account_host: config.db_account_host.clone(),
        })
    }

    #[must_use]
    pub fn with_password_generator(mut self, passwords: PasswordGenerator) -> Self {
        self.passwords = passwords;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_account_host(mut self, account_host: impl Into<String>) -> Self {
        self.account_host = account_host.into();
        self
    }

    /// Handle one invocation record
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` before touching the store or the target when the
    /// step name is not recognised, otherwise whatever the step returns.
    pub async fn handle(&self, event: &RotationEvent) -> Result<StepOutcome> {
        let step = match event.step() {
            Ok(step) => step,
            Err(e) => {
                error!(
                    secret.id = event.secret_id.as_str(),
                    step = event.step.as_str(),
                    token = event.client_request_token.as_str(),
                    error = %e,
                    "Rejecting rotation invocation"
                );
                metrics::increment_step_errors("unknown", e.kind());
                return Err(e);
            }
        };

        self.run_step(&event.secret_id, &event.client_request_token, step)
            .await
    }

    /// Run every step in protocol order with one token, stopping at the first failure
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step.
    pub async fn rotate(
        &self,
        secret_id: &str,
        token: &str,
    ) -> Result<Vec<(RotationStep, StepOutcome)>> {
        let mut outcomes = Vec::with_capacity(RotationStep::ALL.len());
        for step in RotationStep::ALL {
            let outcome = self.run_step(secret_id, token, step).await?;
            outcomes.push((step, outcome));
        }
        info!(
            secret.id = secret_id,
            token = token,
            "Rotation completed"
        );
        Ok(outcomes)
    }

    /// Run one step with logging and metrics
    ///
    /// # Errors
    ///
    /// Returns the step's error unchanged.
    pub async fn run_step(
        &self,
        secret_id: &str,
        token: &str,
        step: RotationStep,
    ) -> Result<StepOutcome> {
        let span = info_span!(
            "rotation.step",
            secret.id = secret_id,
            step = step.as_str(),
            token = token
        );

        async {
            let start = Instant::now();
            info!("Rotation step started");

            let result = match step {
                RotationStep::CreateSecret => self.create_secret(secret_id, token).await,
                RotationStep::SetSecret => self.set_secret(secret_id, token).await,
                RotationStep::TestSecret => self.test_secret(secret_id, token).await,
                RotationStep::FinishSecret => self.finish_secret(secret_id, token).await,
            };
            let duration = start.elapsed().as_secs_f64();

            match &result {
                Ok(outcome) => {
                    metrics::record_step_outcome(step.as_str(), outcome.as_str(), duration);
                    info!(
                        outcome = outcome.as_str(),
                        duration_secs = duration,
                        "Rotation step finished"
                    );
                }
                Err(e) => {
                    metrics::record_step_outcome(step.as_str(), "failed", duration);
                    metrics::increment_step_errors(step.as_str(), e.kind());
                    error!(
                        error = %e,
                        kind = e.kind(),
                        retryable = e.is_retryable(),
                        duration_secs = duration,
                        "Rotation step failed"
                    );
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    /// Store a new `AWSPENDING` version derived from `AWSCURRENT`
    ///
    /// # Errors
    ///
    /// Store failures, a malformed current payload, or a store conflict when
    /// the token was already used for different content.
    pub async fn create_secret(&self, secret_id: &str, token: &str) -> Result<StepOutcome> {
        let stages = self.store.describe_secret(secret_id).await?;
        if stages.has_stage(token, &StageLabel::Pending) {
            info!("createSecret: pending version already exists for token");
            return Ok(StepOutcome::AlreadyCompleted);
        }

        let current = self
            .store
            .get_secret_value(secret_id, &VersionSelector::current())
            .await?;
        let password = self.passwords.generate();
        let pending = with_new_password(&current.content.json_bytes(), &password)?;

        self.store
            .put_secret_value(secret_id, token, &pending, &[StageLabel::Pending])
            .await?;

        info!(
            current_token = current.token.as_str(),
            "createSecret: stored pending version"
        );
        Ok(StepOutcome::Completed)
    }

    /// Apply the pending password to the database
    ///
    /// # Errors
    ///
    /// `VersionNotFound` without a pending version for the token, target
    /// errors from connecting or changing the password.
    pub async fn set_secret(&self, secret_id: &str, token: &str) -> Result<StepOutcome> {
        let pending = self
            .fetch_payload(secret_id, &VersionSelector::pending(token))
            .await?;
        let current = self
            .fetch_payload(secret_id, &VersionSelector::current())
            .await?;

        let admin = current.admin_credentials();
        if admin.self_rotation {
            warn!(
                username = admin.username,
                "setSecret: no superuser in current secret, account changes its own password"
            );
        }

        let admin_params = pending.connect_params_as(admin.username, admin.password);
        let mut conn = match self.target.connect(&admin_params, self.connect_timeout).await {
            Ok(conn) => conn,
            // A self-rotating account that already switched passwords on an
            // earlier attempt only accepts the pending one
            Err(TargetError::AuthenticationFailed { .. })
                if admin.self_rotation && admin.username == pending.username =>
            {
                warn!(
                    username = admin.username,
                    "setSecret: current password rejected, retrying with the pending password"
                );
                self.target
                    .connect(&pending.connect_params(), self.connect_timeout)
                    .await?
            }
            Err(e) => return Err(e.into()),
        };

        let result = self.change_password(conn.as_mut(), &pending).await;
        conn.close().await;
        let form = result?;

        info!(
            username = pending.username.as_str(),
            form = form.as_str(),
            "setSecret: database password updated"
        );
        Ok(StepOutcome::Completed)
    }

    async fn change_password(
        &self,
        conn: &mut dyn TargetConnection,
        pending: &CredentialPayload,
    ) -> std::result::Result<ChangeForm, TargetError> {
        let form = apply_credential_change(
            conn,
            &pending.username,
            &self.account_host,
            &pending.password,
        )
        .await?;
        conn.commit().await?;
        Ok(form)
    }

    /// Log in with the pending credentials and run the liveness query
    ///
    /// # Errors
    ///
    /// `VersionNotFound` without a pending version for the token;
    /// `ValidationFailure` for any failed login or unexpected query result.
    pub async fn test_secret(&self, secret_id: &str, token: &str) -> Result<StepOutcome> {
        let pending = self
            .fetch_payload(secret_id, &VersionSelector::pending(token))
            .await?;

        let mut conn = self
            .target
            .connect(&pending.connect_params(), self.connect_timeout)
            .await
            .map_err(|e| {
                RotationError::validation_failure(
                    secret_id,
                    format!("login as {} failed: {e}", pending.username),
                )
            })?;

        let probe = conn.liveness_probe().await;
        conn.close().await;

        match probe {
            Ok(rows) if rows == [1] => {
                info!(
                    username = pending.username.as_str(),
                    "testSecret: pending credentials verified"
                );
                Ok(StepOutcome::Completed)
            }
            Ok(rows) => Err(RotationError::validation_failure(
                secret_id,
                format!("liveness query returned {rows:?}, expected [1]"),
            )),
            Err(e) => Err(RotationError::validation_failure(
                secret_id,
                format!("liveness query failed: {e}"),
            )),
        }
    }

    /// Promote the token's version to `AWSCURRENT`
    ///
    /// # Errors
    ///
    /// `VersionNotFound` when the token is not a version of the secret, store
    /// errors from the stage update.
    pub async fn finish_secret(&self, secret_id: &str, token: &str) -> Result<StepOutcome> {
        let stages = self.store.describe_secret(secret_id).await?;
        if stages.has_stage(token, &StageLabel::Current) {
            info!("finishSecret: version already marked current");
            return Ok(StepOutcome::AlreadyCompleted);
        }
        if !stages.contains_token(token) {
            return Err(RotationError::VersionNotFound {
                secret_id: secret_id.to_string(),
                selector: VersionSelector::token(token).to_string(),
            });
        }

        let displaced = stages.token_with_stage(&StageLabel::Current);
        self.store
            .update_secret_version_stage(secret_id, &StageLabel::Current, token, displaced)
            .await?;

        info!(
            previous_token = displaced.unwrap_or("none"),
            "finishSecret: moved current stage to version"
        );
        Ok(StepOutcome::Completed)
    }

    async fn fetch_payload(
        &self,
        secret_id: &str,
        selector: &VersionSelector,
    ) -> Result<CredentialPayload> {
        let value = self.store.get_secret_value(secret_id, selector).await?;
        CredentialPayload::from_json(&value.content.json_bytes())
    }
}
