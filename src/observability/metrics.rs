//! # Metrics
//!
//! Prometheus metrics for monitoring rotations.
//!
//! ## Metrics Exposed
//!
//! - `secret_rotation_steps_total{step,outcome}` - Step invocations by outcome
//!   (`completed`, `already_completed`, `failed`)
//! - `secret_rotation_step_errors_total{step,kind}` - Step failures by error kind
//! - `secret_rotation_step_duration_seconds{step}` - Duration of rotation steps
//! - `secret_rotation_credential_change_fallbacks_total` - Legacy statement fallbacks
//! - `secret_rotation_store_operations_total{operation}` - Secret store operations
//! - `secret_rotation_store_operation_duration_seconds{operation}` - Secret store latency
//! - `secret_rotation_store_operation_errors_total{operation}` - Secret store errors
//!
//! A rotation is a short-lived process, so the registry is rendered in text
//! exposition format at the end of a run rather than served over HTTP.

use anyhow::Result;
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static ROTATION_STEPS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secret_rotation_steps_total",
            "Total number of rotation step invocations by step and outcome",
        ),
        &["step", "outcome"],
    )
    .expect("Failed to create ROTATION_STEPS_TOTAL metric - this should never happen")
});

static ROTATION_STEP_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secret_rotation_step_errors_total",
            "Total number of rotation step failures by step and error kind",
        ),
        &["step", "kind"],
    )
    .expect("Failed to create ROTATION_STEP_ERRORS_TOTAL metric - this should never happen")
});

static ROTATION_STEP_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "secret_rotation_step_duration_seconds",
            "Duration of rotation steps in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["step"],
    )
    .expect("Failed to create ROTATION_STEP_DURATION metric - this should never happen")
});

static CREDENTIAL_CHANGE_FALLBACKS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_rotation_credential_change_fallbacks_total",
        "Total number of credential changes that fell back to a legacy statement form",
    )
    .expect("Failed to create CREDENTIAL_CHANGE_FALLBACKS_TOTAL metric - this should never happen")
});

static STORE_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secret_rotation_store_operations_total",
            "Total number of secret store operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create STORE_OPERATIONS_TOTAL metric - this should never happen")
});

static STORE_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "secret_rotation_store_operation_duration_seconds",
            "Duration of secret store operations in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create STORE_OPERATION_DURATION metric - this should never happen")
});

static STORE_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secret_rotation_store_operation_errors_total",
            "Total number of secret store operation errors by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create STORE_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(ROTATION_STEPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROTATION_STEP_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROTATION_STEP_DURATION.clone()))?;
    REGISTRY.register(Box::new(CREDENTIAL_CHANGE_FALLBACKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(STORE_OPERATION_ERRORS_TOTAL.clone()))?;

    Ok(())
}

/// Render all registered metrics in Prometheus text exposition format
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn render_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_step_outcome(step: &str, outcome: &str, duration: f64) {
    ROTATION_STEPS_TOTAL
        .with_label_values(&[step, outcome])
        .inc();
    ROTATION_STEP_DURATION
        .with_label_values(&[step])
        .observe(duration);
}

pub fn increment_step_errors(step: &str, kind: &str) {
    ROTATION_STEP_ERRORS_TOTAL
        .with_label_values(&[step, kind])
        .inc();
}

pub fn increment_credential_change_fallbacks() {
    CREDENTIAL_CHANGE_FALLBACKS_TOTAL.inc();
}

#[must_use]
pub fn credential_change_fallbacks() -> u64 {
    CREDENTIAL_CHANGE_FALLBACKS_TOTAL.get()
}

/// Step invocation count for one step and outcome
#[must_use]
pub fn step_count(step: &str, outcome: &str) -> u64 {
    ROTATION_STEPS_TOTAL
        .with_label_values(&[step, outcome])
        .get()
}

pub fn record_store_operation(operation: &str, duration: f64) {
    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
    STORE_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

/// Increment secret store operation errors counter
pub fn increment_store_operation_errors(operation: &str) {
    STORE_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_outcomes_are_counted() {
        let before = step_count("metrics_test_step", "completed");
        record_step_outcome("metrics_test_step", "completed", 0.2);
        record_step_outcome("metrics_test_step", "completed", 0.4);
        assert_eq!(step_count("metrics_test_step", "completed"), before + 2);
    }

    #[test]
    fn test_render_text_includes_registered_metrics() {
        // Registration is process-wide; a second call from another test is fine to fail
        let _ = register_metrics();
        increment_credential_change_fallbacks();
        let text = render_text().unwrap();
        assert!(text.contains("secret_rotation_credential_change_fallbacks_total"));
    }
}
