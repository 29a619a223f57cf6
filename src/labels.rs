// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Annotation keys, cloud tag keys, and finalizer names used across alby.
//!
//! All alby-specific Ingress annotations live under the
//! `alby.firestoned.io/` prefix. Cloud resources created by the controller
//! carry the `managed-by` and `group` tags; discovery is purely tag-based
//! and resources without the `managed-by` tag are never touched.

// ============================================================================
// Annotation Prefix
// ============================================================================

/// Prefix for all alby Ingress annotations
pub const ANNOTATION_PREFIX: &str = "alby.firestoned.io";

// ============================================================================
// Load-balancer-scoped Annotations
// ============================================================================

/// Load balancer scheme: `internal` or `internet-facing`
pub const ANNOTATION_SCHEME: &str = "alby.firestoned.io/scheme";

/// Comma-separated subnet IDs or subnet `Name` tag values
pub const ANNOTATION_SUBNETS: &str = "alby.firestoned.io/subnets";

/// Comma-separated security group IDs or `Name` tag values.
///
/// When absent, the controller provisions and manages an implicit
/// security group for the load balancer.
pub const ANNOTATION_SECURITY_GROUPS: &str = "alby.firestoned.io/security-groups";

/// Comma-separated `key=value` tags applied to every managed cloud resource
pub const ANNOTATION_TAGS: &str = "alby.firestoned.io/tags";

/// Identifier of a web-application-firewall ACL to associate with the LB
pub const ANNOTATION_WAFACL_ID: &str = "alby.firestoned.io/wafacl-id";

/// Comma-separated CIDRs allowed inbound on the managed security group
pub const ANNOTATION_INBOUND_CIDRS: &str = "alby.firestoned.io/inbound-cidrs";

// ============================================================================
// Rule-scoped Annotations
// ============================================================================

/// Externally-provisioned certificate identifier enabling HTTPS listeners
pub const ANNOTATION_CERTIFICATE_ARN: &str = "alby.firestoned.io/certificate-arn";

/// Comma-separated listener ports; defaults to 80, or 443 with a certificate
pub const ANNOTATION_LISTEN_PORTS: &str = "alby.firestoned.io/listen-ports";

/// Backend protocol: `HTTP` or `HTTPS`
pub const ANNOTATION_BACKEND_PROTOCOL: &str = "alby.firestoned.io/backend-protocol";

/// Health check path, defaults to `/`
pub const ANNOTATION_HEALTHCHECK_PATH: &str = "alby.firestoned.io/healthcheck-path";

/// Consecutive successes before a target is healthy, defaults to 2
pub const ANNOTATION_HEALTHY_THRESHOLD: &str = "alby.firestoned.io/healthy-threshold-count";

/// Consecutive failures before a target is unhealthy, defaults to 2
pub const ANNOTATION_UNHEALTHY_THRESHOLD: &str = "alby.firestoned.io/unhealthy-threshold-count";

/// HTTP codes counted as healthy, defaults to `200`
pub const ANNOTATION_SUCCESS_CODES: &str = "alby.firestoned.io/success-codes";

/// Target registration mode: `instance` or `ip`
pub const ANNOTATION_TARGET_TYPE: &str = "alby.firestoned.io/target-type";

/// Comma-separated `key=value` target group attributes
pub const ANNOTATION_TARGET_GROUP_ATTRIBUTES: &str =
    "alby.firestoned.io/target-group-attributes";

// ============================================================================
// Group Annotations
// ============================================================================

/// Explicit ingress group name; Ingresses sharing it share one load balancer
pub const ANNOTATION_GROUP_NAME: &str = "alby.firestoned.io/group.name";

/// Integer ordering of a member within its group, defaults to 0
pub const ANNOTATION_GROUP_ORDER: &str = "alby.firestoned.io/group.order";

// ============================================================================
// Ingress Class
// ============================================================================

/// Legacy ingress-class annotation, honored alongside `spec.ingressClassName`
pub const ANNOTATION_INGRESS_CLASS: &str = "kubernetes.io/ingress.class";

// ============================================================================
// Cloud Tags
// ============================================================================

/// Tag carrying the controller identity; resources without it are never modified
pub const TAG_MANAGED_BY: &str = "managed-by";

/// Tag carrying the group identity that owns the resource
pub const TAG_GROUP: &str = "group";

/// Conventional cloud `Name` tag; carries the full group id on the managed SG
pub const TAG_NAME: &str = "Name";

// ============================================================================
// Finalizers
// ============================================================================

/// Prefix of the per-group finalizer placed on member Ingresses.
///
/// The full finalizer is `group.alby.firestoned.io/<group-name>`; its
/// presence is the sole signal that the controller still holds an interest
/// in the member's contribution to the deployed stack.
pub const GROUP_FINALIZER_PREFIX: &str = "group.alby.firestoned.io/";

/// Finalizer placed on the members of implicit (single-Ingress) groups.
///
/// An implicit group is identified by its only member, so the finalizer
/// does not need to carry a group name.
pub const IMPLICIT_GROUP_FINALIZER: &str = "alby.firestoned.io/resources";

/// Build the finalizer name for an explicit group.
#[must_use]
pub fn group_finalizer(group: &str) -> String {
    format!("{GROUP_FINALIZER_PREFIX}{group}")
}

// ============================================================================
// Resource Naming
// ============================================================================

/// Prefix of every cloud resource name minted by the controller
pub const NAME_PREFIX: &str = "alby";

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
