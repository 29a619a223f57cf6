// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the alby controller.
//!
//! All metrics carry the namespace prefix `alby_firestoned_io_` and are
//! registered in [`METRICS_REGISTRY`], exposed via the `/metrics` endpoint.

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all alby metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "alby_firestoned_io";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total group reconciles by outcome
///
/// Labels:
/// - `status`: `success` or `error`
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of group reconciliations by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of group reconciles in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of group reconciliations in seconds",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Cloud API calls by operation and outcome
///
/// Labels:
/// - `operation`: facade method name, e.g. `create_load_balancer`
/// - `status`: `success`, `error`, or `retried`
pub static CLOUD_CALLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cloud_calls_total"),
        "Total cloud API calls by operation and status",
    );
    let counter = CounterVec::new(opts, &["operation", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Cloud API call latency in seconds by operation
pub static CLOUD_CALL_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_cloud_call_duration_seconds"),
        "Duration of cloud API calls in seconds by operation",
    )
    .buckets(vec![0.005, 0.025, 0.1, 0.25, 1.0, 2.5, 10.0]);
    let histogram = HistogramVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Deploy actions executed by resource class and action
pub static DEPLOY_ACTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_deploy_actions_total"),
        "Stack deploy actions executed by resource class and action kind",
    );
    let counter = CounterVec::new(opts, &["class", "action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Groups currently queued or running
pub static GROUPS_IN_FLIGHT: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_groups_in_flight"),
        "Groups currently queued or running by state",
    );
    let gauge = GaugeVec::new(opts, &["state"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Annotation negative-cache hits
pub static ANNOTATION_CACHE_HITS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_annotation_cache_hits_total"),
        "Hits on the annotation parse-error negative cache",
    );
    let counter = CounterVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record a finished reconcile.
pub fn record_reconciliation(success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };
    RECONCILIATION_TOTAL.with_label_values(&[status]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration.as_secs_f64());
}

/// Record one cloud API call.
pub fn record_cloud_call(operation: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };
    CLOUD_CALLS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    CLOUD_CALL_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record a retried cloud API call attempt.
pub fn record_cloud_retry(operation: &str) {
    CLOUD_CALLS_TOTAL
        .with_label_values(&[operation, "retried"])
        .inc();
}

/// Record one executed deploy action.
pub fn record_deploy_action(class: &str, action: &str) {
    DEPLOY_ACTIONS_TOTAL.with_label_values(&[class, action]).inc();
}

/// Gather all registered metrics in the Prometheus text format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> anyhow::Result<String> {
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
