// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller-wide tunables.

/// Worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default number of concurrent group reconcile workers
pub const DEFAULT_RECONCILE_WORKERS: usize = 8;

/// Default wall-clock deadline for one group reconcile, in seconds
pub const DEFAULT_RECONCILE_DEADLINE_SECS: u64 = 30;

/// Initial re-enqueue delay after a failed reconcile, in seconds
pub const RECONCILE_BACKOFF_INITIAL_SECS: u64 = 1;

/// Upper bound on the re-enqueue delay, in seconds
pub const RECONCILE_BACKOFF_CAP_SECS: u64 = 60;

/// Maximum pages fetched from one cloud list call before aborting.
///
/// Safety limit against a next-token that never drains.
pub const CLOUD_LIST_MAX_PAGES: usize = 1_000;

/// How long a failed annotation fingerprint stays in the negative cache
pub const ANNOTATION_ERROR_CACHE_TTL_SECS: u64 = 3_600;

/// Cloud resource names (load balancers, target groups) are capped here
pub const CLOUD_NAME_MAX_LEN: usize = 32;

/// Security group names are capped here; the `Name` tag carries the full id
pub const SECURITY_GROUP_NAME_MAX_LEN: usize = 255;

/// Provisional rule priority floor used while re-writing a listener's rules
pub const RULE_PRIORITY_PROVISIONAL_BASE: u32 = 10_000;

/// Metrics HTTP server bind address
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

/// Metrics HTTP server port
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Metrics HTTP server path
pub const METRICS_SERVER_PATH: &str = "/metrics";
