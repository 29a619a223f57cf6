// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed records exchanged with the cloud APIs.
//!
//! These are plain data carriers: the facade builds them from provider
//! responses and the reconciliation core consumes them without ever touching
//! the SDK transport (an external collaborator behind [`crate::aws::CloudApi`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Load balancer scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    /// Reachable only inside the VPC
    Internal,
    /// Reachable from the public internet
    InternetFacing,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => f.write_str("internal"),
            Self::InternetFacing => f.write_str("internet-facing"),
        }
    }
}

/// Listener / target group protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("HTTP"),
            Self::Https => f.write_str("HTTPS"),
        }
    }
}

/// How targets are registered with a target group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// Node instance IDs and node ports
    #[default]
    Instance,
    /// Pod IPs
    Ip,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance => f.write_str("instance"),
            Self::Ip => f.write_str("ip"),
        }
    }
}

/// A routing rule match condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "kebab-case")]
pub enum Condition {
    /// `host-header` match on the request's Host
    HostHeader(String),
    /// `path-pattern` match on the request path
    PathPattern(String),
}

/// Priority slot of a listener rule.
///
/// Numeric priorities are dense from 1; the default rule carries the
/// `default` priority and no conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RulePriority {
    /// Numbered slot, evaluated in ascending order
    At(u32),
    /// The listener's fallback rule
    Default,
}

impl fmt::Display for RulePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(n) => write!(f, "{n}"),
            Self::Default => f.write_str("default"),
        }
    }
}

impl Serialize for RulePriority {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RulePriority {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "default" {
            return Ok(Self::Default);
        }
        raw.parse::<u32>()
            .map(Self::At)
            .map_err(|_| serde::de::Error::custom(format!("invalid rule priority: {raw}")))
    }
}

/// The action a listener or rule takes on a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForwardAction {
    /// Forward to a target group by ARN
    Forward {
        /// ARN of the destination target group
        target_group_arn: String,
    },
    /// Return a fixed response without forwarding
    FixedResponse {
        /// HTTP status code of the fixed response
        status_code: u16,
    },
}

/// Target group health check settings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Path probed on each target
    pub path: String,
    /// Consecutive successes before healthy
    pub healthy_threshold: u32,
    /// Consecutive failures before unhealthy
    pub unhealthy_threshold: u32,
    /// HTTP codes counted as success, e.g. `200` or `200-399`
    pub success_codes: String,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            healthy_threshold: 2,
            unhealthy_threshold: 2,
            success_codes: "200".to_string(),
        }
    }
}

/// One registered (or registerable) target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetDescription {
    /// Instance ID or pod IP, depending on the target type
    pub id: String,
    /// Traffic port on the target
    pub port: u16,
}

/// Health state of a registered target as last read from the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetHealthState {
    Initial,
    Healthy,
    Unhealthy,
    /// Deregistering; present but terminal, never re-registered
    Draining,
    Unused,
}

/// A target together with its health state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetHealth {
    pub target: TargetDescription,
    pub state: TargetHealthState,
}

/// An inbound security group permission.
///
/// Equality is set-semantic over the CIDR and group-pair lists; see
/// [`crate::diff`] for the comparison rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpPermission {
    /// IP protocol, e.g. `tcp`
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    /// Allowed source CIDR blocks
    pub cidrs: Vec<String>,
    /// Allowed source security groups
    pub group_pairs: Vec<UserIdGroupPair>,
}

/// A source security group in an inbound permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdGroupPair {
    pub group_id: String,
    /// Owning account for cross-account grants; ignored in equality
    pub user_id: Option<String>,
}

// ============================================================================
// Read models
// ============================================================================

/// A load balancer as last read from the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerData {
    pub arn: String,
    pub name: String,
    pub dns_name: String,
    pub scheme: Scheme,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
}

/// A listener as last read from the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerData {
    pub arn: String,
    pub load_balancer_arn: String,
    pub port: u16,
    pub protocol: Protocol,
    pub certificate_arn: Option<String>,
    pub default_action: ForwardAction,
}

/// A listener rule as last read from the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleData {
    pub arn: String,
    pub listener_arn: String,
    pub priority: RulePriority,
    pub conditions: Vec<Condition>,
    pub action: ForwardAction,
}

/// A target group as last read from the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupData {
    pub arn: String,
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
    pub target_type: TargetType,
    pub vpc_id: String,
    pub health_check: HealthCheck,
}

/// A security group as last read from the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupData {
    pub id: String,
    pub name: String,
    pub description: String,
    pub inbound: Vec<IpPermission>,
    pub tags: BTreeMap<String, String>,
}

/// A subnet as last read from the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetData {
    pub id: String,
    pub availability_zone: String,
    /// Value of the subnet's `Name` tag, when present
    pub name_tag: Option<String>,
}

/// One page of a paginated list response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque marker for the next page, `None` on the last page
    pub next: Option<String>,
}

// ============================================================================
// Write models
// ============================================================================

/// Input for creating a load balancer.
#[derive(Debug, Clone)]
pub struct CreateLoadBalancerInput {
    pub name: String,
    pub scheme: Scheme,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

/// Input for creating a listener.
#[derive(Debug, Clone)]
pub struct CreateListenerInput {
    pub load_balancer_arn: String,
    pub port: u16,
    pub protocol: Protocol,
    pub certificate_arn: Option<String>,
    pub default_action: ForwardAction,
}

/// Input for creating a listener rule.
#[derive(Debug, Clone)]
pub struct CreateRuleInput {
    pub listener_arn: String,
    pub priority: u32,
    pub conditions: Vec<Condition>,
    pub action: ForwardAction,
}

/// Input for creating a target group.
#[derive(Debug, Clone)]
pub struct CreateTargetGroupInput {
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
    pub target_type: TargetType,
    pub vpc_id: String,
    pub health_check: HealthCheck,
    pub attributes: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

/// Input for creating a security group.
#[derive(Debug, Clone)]
pub struct CreateSecurityGroupInput {
    pub name: String,
    pub description: String,
    pub vpc_id: String,
    pub tags: BTreeMap<String, String>,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
