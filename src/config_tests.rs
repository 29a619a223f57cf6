// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`
//!
//! Environment-variable loading is covered indirectly: mutating the
//! process environment is racy under the parallel test runner, so these
//! tests stick to the default construction paths.

#[cfg(test)]
mod tests {
    use crate::config::ControllerConfig;
    use crate::constants::{DEFAULT_RECONCILE_DEADLINE_SECS, DEFAULT_RECONCILE_WORKERS};
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.controller_id, "alby");
        assert_eq!(config.ingress_class, "alb");
        assert!(!config.default_class);
        assert_eq!(config.workers, DEFAULT_RECONCILE_WORKERS);
        assert_eq!(
            config.reconcile_deadline,
            Duration::from_secs(DEFAULT_RECONCILE_DEADLINE_SECS)
        );
        assert!(config.backoff_initial < config.backoff_cap);
        assert!(config.annotation_defaults.is_empty());
    }
}
