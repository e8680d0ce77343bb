//! # AWS Secrets Manager Client
//!
//! Client for interacting with AWS Secrets Manager API.
//!
//! This module provides functionality to:
//! - Describe a secret's version → staging label map
//! - Read versions by token and/or staging label
//! - Write new versions with a client request token
//! - Move staging labels between versions
//!
//! Credentials come from the SDK default chain (environment, profile,
//! IRSA web identity, instance metadata).

mod operations;

use crate::config::RotatorConfig;
use anyhow::Result;
use aws_config::timeout::TimeoutConfig;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use tracing::info;

/// AWS Secrets Manager backed `SecretStore`
pub struct AwsSecretsManagerStore {
    client: SecretsManagerClient,
    region: String,
}

impl std::fmt::Debug for AwsSecretsManagerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretsManagerStore")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsSecretsManagerStore {
    /// Create a new AWS Secrets Manager client
    ///
    /// Connect and operation timeouts are bounded by `store_timeout_secs`.
    #[allow(
        clippy::missing_errors_doc,
        reason = "Error documentation is provided in doc comments"
    )]
    pub async fn new(config: &RotatorConfig) -> Result<Self> {
        let sdk_config = Self::load_sdk_config(config).await;
        Ok(Self::from_sdk_config(&sdk_config))
    }

    /// Wrap an already-loaded SDK configuration
    #[must_use]
    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        let region = sdk_config
            .region()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);

        Self {
            client: SecretsManagerClient::new(sdk_config),
            region,
        }
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    async fn load_sdk_config(config: &RotatorConfig) -> SdkConfig {
        let timeout = config.store_timeout();
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(timeout)
                .operation_timeout(timeout)
                .build(),
        );

        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        if let Some(endpoint) = &config.secrets_manager_endpoint {
            info!(
                endpoint = endpoint.as_str(),
                "Overriding AWS Secrets Manager endpoint"
            );
            loader = loader.endpoint_url(endpoint.clone());
        }

        loader.load().await
    }
}
