//! # AWS Secrets Manager Operations
//!
//! Implements `SecretStore` trait for AWS Secrets Manager.

use super::AwsSecretsManagerStore;
use crate::observability::metrics;
use crate::provider::{SecretStore, StoreError};
use crate::secret::{SecretValue, StageLabel, VersionSelector, VersionStages};
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use std::time::Instant;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};

/// Map an SDK failure onto the store error taxonomy
fn classify_sdk_error<E, R>(err: &SdkError<E, R>, secret_id: &str, selector: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(err).to_string();

    if matches!(err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) {
        return StoreError::unavailable(message);
    }

    match err.code() {
        Some("ResourceNotFoundException") => StoreError::not_found(secret_id, selector),
        Some("ResourceExistsException") => StoreError::conflict(message),
        Some("InvalidParameterException" | "InvalidRequestException") => {
            StoreError::invalid_request(message)
        }
        _ => StoreError::backend(message),
    }
}

/// Record the outcome of one store call on its span and in metrics
fn finish_operation<T>(
    span: &Span,
    operation: &'static str,
    start: Instant,
    result: &Result<T, StoreError>,
) {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Operation durations are far below u64::MAX milliseconds"
    )]
    span.record("operation.duration_ms", start.elapsed().as_millis() as u64);
    match result {
        Ok(_) => {
            span.record("operation.success", true);
            metrics::record_store_operation(operation, start.elapsed().as_secs_f64());
        }
        Err(e) => {
            span.record("operation.success", false);
            span.record("error.message", e.to_string());
            metrics::increment_store_operation_errors(operation);
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManagerStore {
    async fn describe_secret(&self, secret_id: &str) -> Result<VersionStages, StoreError> {
        let span = info_span!(
            "aws.secret.describe",
            secret.id = secret_id,
            region = self.region.as_str(),
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let result = match self.client.describe_secret().secret_id(secret_id).send().await {
                Ok(output) => {
                    let stages = output
                        .version_ids_to_stages()
                        .cloned()
                        .unwrap_or_default();
                    debug!(versions = stages.len(), "Described AWS secret");
                    Ok(VersionStages::from_wire(stages))
                }
                Err(e) => Err(classify_sdk_error(&e, secret_id, "secret")),
            };
            finish_operation(&span_clone, "describe", start, &result);
            result
        }
        .instrument(span)
        .await
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        selector: &VersionSelector,
    ) -> Result<SecretValue, StoreError> {
        let span = tracing::debug_span!(
            "aws.secret.get",
            secret.id = secret_id,
            region = self.region.as_str(),
            version.selector = %selector,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let response = self
                .client
                .get_secret_value()
                .secret_id(secret_id)
                .set_version_id(selector.token.clone())
                .set_version_stage(selector.stage.as_ref().map(|s| s.as_str().to_string()))
                .send()
                .await;

            let result = match response {
                Ok(output) => {
                    let token = output.version_id().unwrap_or_default().to_string();
                    if let Some(text) = output.secret_string() {
                        Ok(SecretValue::text(token, text))
                    } else if let Some(blob) = output.secret_binary() {
                        Ok(SecretValue::binary(token, blob.as_ref().to_vec()))
                    } else {
                        Err(StoreError::backend(format!(
                            "{selector} of secret {secret_id} has no string or binary value"
                        )))
                    }
                }
                Err(e) => Err(classify_sdk_error(&e, secret_id, &selector.to_string())),
            };
            finish_operation(&span_clone, "get", start, &result);
            result
        }
        .instrument(span)
        .await
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        token: &str,
        secret_string: &str,
        stages: &[StageLabel],
    ) -> Result<(), StoreError> {
        let span = info_span!(
            "aws.secret.put",
            secret.id = secret_id,
            region = self.region.as_str(),
            version.token = token,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let response = self
                .client
                .put_secret_value()
                .secret_id(secret_id)
                .client_request_token(token)
                .secret_string(secret_string)
                .set_version_stages(Some(
                    stages.iter().map(|s| s.as_str().to_string()).collect(),
                ))
                .send()
                .await;

            let result = match response {
                Ok(_) => {
                    info!(
                        secret_id = secret_id,
                        token = token,
                        "Wrote AWS secret version"
                    );
                    Ok(())
                }
                Err(e) => {
                    let error = classify_sdk_error(&e, secret_id, "secret");
                    warn!(secret_id = secret_id, token = token, error = %error, "Failed to write AWS secret version");
                    Err(error)
                }
            };
            finish_operation(&span_clone, "put", start, &result);
            result
        }
        .instrument(span)
        .await
    }

    async fn update_secret_version_stage(
        &self,
        secret_id: &str,
        stage: &StageLabel,
        move_to_token: &str,
        remove_from_token: Option<&str>,
    ) -> Result<(), StoreError> {
        let span = info_span!(
            "aws.secret.update_stage",
            secret.id = secret_id,
            region = self.region.as_str(),
            version.stage = stage.as_str(),
            version.token = move_to_token,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let response = self
                .client
                .update_secret_version_stage()
                .secret_id(secret_id)
                .version_stage(stage.as_str())
                .move_to_version_id(move_to_token)
                .set_remove_from_version_id(remove_from_token.map(str::to_string))
                .send()
                .await;

            let result = match response {
                Ok(_) => Ok(()),
                Err(e) => Err(classify_sdk_error(
                    &e,
                    secret_id,
                    &format!("version {move_to_token}"),
                )),
            };
            finish_operation(&span_clone, "update_stage", start, &result);
            result
        }
        .instrument(span)
        .await
    }
}
