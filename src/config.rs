// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration loaded from the environment.

use crate::constants::{
    DEFAULT_RECONCILE_DEADLINE_SECS, DEFAULT_RECONCILE_WORKERS, RECONCILE_BACKOFF_CAP_SECS,
    RECONCILE_BACKOFF_INITIAL_SECS,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Static configuration for one controller process.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Identity written into the `managed-by` tag on every cloud resource
    pub controller_id: String,
    /// Ingress class this controller handles
    pub ingress_class: String,
    /// Whether unclassed Ingresses fall to this controller
    pub default_class: bool,
    /// Cluster identifier, included in default resource tags
    pub cluster_name: String,
    /// VPC every managed resource is created in
    pub vpc_id: String,
    /// Concurrent group reconciles
    pub workers: usize,
    /// Wall-clock budget for one reconcile
    pub reconcile_deadline: Duration,
    /// First re-enqueue delay after a failure
    pub backoff_initial: Duration,
    /// Upper bound on the re-enqueue delay
    pub backoff_cap: Duration,
    /// Cluster-level annotation defaults applied under per-resource values
    pub annotation_defaults: BTreeMap<String, String>,
}

impl ControllerConfig {
    /// Load configuration from `ALBY_*` environment variables.
    ///
    /// Every knob has a default; only `ALBY_VPC_ID` and `ALBY_CLUSTER_NAME`
    /// are expected to be set in a real deployment.
    #[must_use]
    pub fn from_env() -> Self {
        let controller_id =
            std::env::var("ALBY_CONTROLLER_ID").unwrap_or_else(|_| "alby".to_string());

        let ingress_class = std::env::var("ALBY_INGRESS_CLASS").unwrap_or_else(|_| "alb".to_string());

        let default_class = std::env::var("ALBY_DEFAULT_CLASS")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(false);

        let cluster_name =
            std::env::var("ALBY_CLUSTER_NAME").unwrap_or_else(|_| "default".to_string());

        let vpc_id = std::env::var("ALBY_VPC_ID").unwrap_or_default();

        let workers = std::env::var("ALBY_WORKERS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_RECONCILE_WORKERS);

        let reconcile_deadline = std::env::var("ALBY_RECONCILE_DEADLINE_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(
                Duration::from_secs(DEFAULT_RECONCILE_DEADLINE_SECS),
                Duration::from_secs,
            );

        let backoff_initial = std::env::var("ALBY_BACKOFF_INITIAL_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(
                Duration::from_secs(RECONCILE_BACKOFF_INITIAL_SECS),
                Duration::from_secs,
            );

        let backoff_cap = std::env::var("ALBY_BACKOFF_CAP_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(
                Duration::from_secs(RECONCILE_BACKOFF_CAP_SECS),
                Duration::from_secs,
            );

        // Comma-separated key=value pairs, e.g.
        // `alby.firestoned.io/scheme=internal,alby.firestoned.io/target-type=ip`
        let annotation_defaults = std::env::var("ALBY_DEFAULT_ANNOTATIONS")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|token| {
                        let (k, v) = token.split_once('=')?;
                        let k = k.trim();
                        if k.is_empty() {
                            return None;
                        }
                        Some((k.to_string(), v.trim().to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            controller_id,
            ingress_class,
            default_class,
            cluster_name,
            vpc_id,
            workers,
            reconcile_deadline,
            backoff_initial,
            backoff_cap,
            annotation_defaults,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller_id: "alby".to_string(),
            ingress_class: "alb".to_string(),
            default_class: false,
            cluster_name: "default".to_string(),
            vpc_id: String::new(),
            workers: DEFAULT_RECONCILE_WORKERS,
            reconcile_deadline: Duration::from_secs(DEFAULT_RECONCILE_DEADLINE_SECS),
            backoff_initial: Duration::from_secs(RECONCILE_BACKOFF_INITIAL_SECS),
            backoff_cap: Duration::from_secs(RECONCILE_BACKOFF_CAP_SECS),
            annotation_defaults: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
