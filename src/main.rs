//! # DB Secret Rotator
//!
//! Command-line entry point for rotating a MySQL credential held in AWS
//! Secrets Manager.
//!
//! ## Usage
//!
//! ```bash
//! # Run one step from an invocation record
//! db-secret-rotator step --event event.json
//! echo '{"SecretId":"db/app","ClientRequestToken":"...","Step":"createSecret"}' | db-secret-rotator step --event -
//!
//! # Run one step from flags
//! db-secret-rotator step --secret-id db/app --token 3f1c... --step setSecret
//!
//! # Run a whole rotation with a fresh token
//! db-secret-rotator rotate --secret-id db/app
//!
//! # Show the current secret document
//! db-secret-rotator get --secret-id db/app --region eu-west-1
//! ```
//!
//! Logs go to stderr; command results and `--emit-metrics` output go to stdout.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use db_secret_rotator::config::RotatorConfig;
use db_secret_rotator::constants::DEFAULT_RETRIEVAL_REGION;
use db_secret_rotator::observability::{init_logging, metrics};
use db_secret_rotator::provider::AwsSecretsManagerStore;
use db_secret_rotator::retrieval::get_secret_json;
use db_secret_rotator::target::MySqlTarget;
use db_secret_rotator::{RotationCoordinator, RotationEvent};
use serde_json::json;
use std::io::Read;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Rotate MySQL credentials stored in AWS Secrets Manager
#[derive(Parser)]
#[command(name = "db-secret-rotator", version, long_version = LONG_VERSION)]
#[command(
    about = "Rotate MySQL credentials stored in AWS Secrets Manager",
    long_about = None,
    after_help = "\
Steps:
  createSecret  store a new AWSPENDING version with a fresh password
  setSecret     apply the pending password to the database
  testSecret    log in with the pending password and run SELECT 1
  finishSecret  promote the pending version to AWSCURRENT
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print Prometheus metrics in text format to stdout when the command finishes
    #[arg(long, global = true)]
    emit_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single rotation step
    Step {
        /// Invocation record file, or '-' for stdin
        #[arg(long, value_name = "FILE", conflicts_with_all = ["secret_id", "token", "step"])]
        event: Option<String>,

        /// Secret id or ARN
        #[arg(long, required_unless_present = "event")]
        secret_id: Option<String>,

        /// Client request token identifying the version under rotation
        #[arg(long, required_unless_present = "event")]
        token: Option<String>,

        /// createSecret, setSecret, testSecret or finishSecret
        #[arg(long, required_unless_present = "event")]
        step: Option<String>,
    },
    /// Run all four steps in order, stopping at the first failure
    Rotate {
        /// Secret id or ARN
        #[arg(long)]
        secret_id: String,

        /// Client request token (a random UUID when omitted)
        #[arg(long)]
        token: Option<String>,
    },
    /// Print the current secret document as JSON
    Get {
        /// Secret id or ARN
        #[arg(long)]
        secret_id: String,

        /// AWS region (defaults to AWS_REGION, then ap-south-1)
        #[arg(long)]
        region: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS client is built
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow!("Failed to install rustls crypto provider"))?;

    let cli = Cli::parse();

    let config = RotatorConfig::from_env().context("Invalid rotator configuration")?;
    init_logging(&config)?;
    metrics::register_metrics().context("Failed to register metrics")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("BUILD_GIT_HASH"),
        "Starting DB Secret Rotator"
    );

    let result = run(cli.command, &config).await;

    if cli.emit_metrics {
        print!("{}", metrics::render_text()?);
    }

    result
}

async fn run(command: Commands, config: &RotatorConfig) -> Result<()> {
    match command {
        Commands::Step {
            event,
            secret_id,
            token,
            step,
        } => {
            let event = match (event, secret_id, token, step) {
                (Some(source), _, _, _) => read_event(&source)?,
                (None, Some(secret_id), Some(token), Some(step)) => {
                    RotationEvent::new(secret_id, token, step)
                }
                _ => bail!("--secret-id, --token and --step are required without --event"),
            };

            let coordinator = build_coordinator(config).await?;
            let outcome = coordinator.handle(&event).await.with_context(|| {
                format!("{} failed for secret {}", event.step, event.secret_id)
            })?;

            println!(
                "{}",
                json!({
                    "SecretId": event.secret_id,
                    "ClientRequestToken": event.client_request_token,
                    "Step": event.step,
                    "Outcome": outcome.as_str(),
                })
            );
        }
        Commands::Rotate { secret_id, token } => {
            let token = token.unwrap_or_else(|| Uuid::new_v4().to_string());
            let coordinator = build_coordinator(config).await?;
            let outcomes = coordinator
                .rotate(&secret_id, &token)
                .await
                .with_context(|| format!("Rotation of secret {secret_id} with token {token} failed"))?;

            let steps: Vec<_> = outcomes
                .iter()
                .map(|(step, outcome)| json!({"Step": step.as_str(), "Outcome": outcome.as_str()}))
                .collect();
            println!(
                "{}",
                json!({
                    "SecretId": secret_id,
                    "ClientRequestToken": token,
                    "Steps": steps,
                })
            );
        }
        Commands::Get { secret_id, region } => {
            let mut config = config.clone();
            config.region = Some(
                region
                    .or(config.region)
                    .unwrap_or_else(|| DEFAULT_RETRIEVAL_REGION.to_string()),
            );

            let store = AwsSecretsManagerStore::new(&config)
                .await
                .context("Failed to create AWS Secrets Manager client")?;
            let document = get_secret_json(&store, &secret_id)
                .await
                .with_context(|| format!("Failed to read secret {secret_id}"))?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }

    Ok(())
}

async fn build_coordinator(config: &RotatorConfig) -> Result<RotationCoordinator> {
    let store = AwsSecretsManagerStore::new(config)
        .await
        .context("Failed to create AWS Secrets Manager client")?;
    info!(region = store.region(), "AWS Secrets Manager client ready");

    let coordinator = RotationCoordinator::from_config(
        Arc::new(store),
        Arc::new(MySqlTarget::new()),
        config,
    )?;
    Ok(coordinator)
}

fn read_event(source: &str) -> Result<RotationEvent> {
    let bytes = if source == "-" {
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read invocation record from stdin")?;
        buffer
    } else {
        std::fs::read(source)
            .with_context(|| format!("Failed to read invocation record from {source}"))?
    };

    Ok(RotationEvent::from_json(&bytes)?)
}
