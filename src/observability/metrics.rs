//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `secretgen_reconciliations_total{controller}` - Total number of reconciliations
//! - `secretgen_reconciliation_errors_total{controller,kind}` - Reconciliation errors by class
//! - `secretgen_reconciliation_duration_seconds{controller}` - Duration of reconciliations
//! - `secretgen_exported_secrets` - Current number of records in the export registry
//! - `secretgen_secret_writes_total{operation}` - Secret create/update/delete calls
//! - `secretgen_requeues_total{controller,reason}` - Requeues scheduled by the error policy

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "secretgen_reconciliations_total",
            "Total number of reconciliations by controller",
        ),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "secretgen_reconciliation_errors_total",
            "Total number of reconciliation errors by controller and error class",
        ),
        &["controller", "kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "secretgen_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static EXPORTED_SECRETS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "secretgen_exported_secrets",
        "Current number of exported secrets known to the registry",
    )
    .expect("Failed to create EXPORTED_SECRETS metric - this should never happen")
});

static SECRET_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "secretgen_secret_writes_total",
            "Total number of Secret writes by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create SECRET_WRITES_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "secretgen_requeues_total",
            "Total number of requeues by controller and reason",
        ),
        &["controller", "reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

/// Register all metrics with the controller registry
///
/// # Errors
///
/// Fails when a metric is registered twice.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(EXPORTED_SECRETS.clone()))?;
    REGISTRY.register(Box::new(SECRET_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(controller: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[controller]).inc();
}

pub fn increment_reconciliation_errors(controller: &str, kind: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[controller, kind])
        .inc();
}

pub fn observe_reconciliation_duration(controller: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[controller])
        .observe(duration);
}

pub fn set_exported_secrets(count: usize) {
    EXPORTED_SECRETS.set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn increment_secret_writes(operation: &str) {
    SECRET_WRITES_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_requeues(controller: &str, reason: &str) {
    REQUEUES_TOTAL
        .with_label_values(&[controller, reason])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_labelled_per_controller() {
        increment_reconciliations("secretimport-test");
        increment_reconciliations("secretimport-test");
        assert_eq!(
            RECONCILIATIONS_TOTAL
                .with_label_values(&["secretimport-test"])
                .get(),
            2
        );
    }

    #[test]
    fn test_exported_secrets_gauge_tracks_last_value() {
        set_exported_secrets(3);
        assert_eq!(EXPORTED_SECRETS.get(), 3);
    }
}
