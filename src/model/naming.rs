// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deterministic cloud resource names.
//!
//! Cloud names are length-bounded, so group and service identities are
//! encoded as sha256 hex prefixes. The same inputs always produce the same
//! name, which is what lets the current-state assembler pair discovered
//! resources with desired specs.

use crate::constants::{CLOUD_NAME_MAX_LEN, SECURITY_GROUP_NAME_MAX_LEN};
use crate::labels::NAME_PREFIX;
use crate::model::ServiceRef;
use crate::aws::types::{Protocol, TargetType};
use sha2::{Digest, Sha256};

/// Hex sha256 prefix of `input`, `len` characters long.
fn hash_prefix(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex = format!("{digest:x}");
    hex[..len].to_string()
}

/// Load balancer name: `alby-<group-hash>`, within the cloud's 32-char cap.
#[must_use]
pub fn load_balancer_name(group_id: &str) -> String {
    let name = format!("{NAME_PREFIX}-{}", hash_prefix(group_id, 16));
    debug_assert!(name.len() <= CLOUD_NAME_MAX_LEN);
    name
}

/// Target group name: `alby-<group-hash>-<service-hash>`.
///
/// The service hash covers the full pairing identity
/// `(service, servicePort, targetType, protocol)`; the health check is
/// deliberately excluded so health-check edits modify the paired group
/// instead of replacing it.
#[must_use]
pub fn target_group_name(
    group_id: &str,
    service: &ServiceRef,
    target_type: TargetType,
    protocol: Protocol,
) -> String {
    let identity = format!(
        "{}/{}/{}/{}/{}",
        service.namespace, service.name, service.port, target_type, protocol
    );
    let name = format!(
        "{NAME_PREFIX}-{}-{}",
        hash_prefix(group_id, 8),
        hash_prefix(&identity, 10)
    );
    debug_assert!(name.len() <= CLOUD_NAME_MAX_LEN);
    name
}

/// Security group name: `alby-<group-id>`, truncated.
///
/// The full group id lives in the `Name` tag, which is also what the
/// assembler pairs on; the name only has to be stable and unique enough
/// for the cloud's namespace.
#[must_use]
pub fn security_group_name(group_id: &str) -> String {
    let mut name = format!("{NAME_PREFIX}-{group_id}");
    if name.len() > SECURITY_GROUP_NAME_MAX_LEN {
        name.truncate(SECURITY_GROUP_NAME_MAX_LEN);
    }
    name
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod naming_tests;
