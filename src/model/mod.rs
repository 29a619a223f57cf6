// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The desired-state model: a stack of resource specs.
//!
//! A [`Stack`] is a directed acyclic graph of purely-declarative resource
//! specs, built fresh for every reconcile and discarded at its end. Specs
//! never hold cloud identifiers; where one spec needs an attribute of
//! another (a listener needs its load balancer's ARN), it carries a
//! [`Reference`] that the deployer resolves only after the referent's
//! action has committed. The whole model is serializable so a built stack
//! can be logged and round-tripped in tests.

pub mod builder;
pub mod naming;

use crate::aws::types::{Condition, HealthCheck, Protocol, RulePriority, Scheme, TargetType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

/// Identifier of a spec within its stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogicalId(pub String);

impl LogicalId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cloud attribute of a deployed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attribute {
    /// The resource's ARN
    Arn,
    /// A load balancer's DNS name
    DnsName,
    /// A security group's ID
    GroupId,
}

/// An unresolved pointer to an attribute of another spec in the same stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub target: LogicalId,
    pub attribute: Attribute,
}

impl Reference {
    #[must_use]
    pub fn new(target: LogicalId, attribute: Attribute) -> Self {
        Self { target, attribute }
    }

    /// Reference to a spec's ARN.
    #[must_use]
    pub fn arn(target: LogicalId) -> Self {
        Self::new(target, Attribute::Arn)
    }

    /// Reference to a security group spec's ID.
    #[must_use]
    pub fn group_id(target: LogicalId) -> Self {
        Self::new(target, Attribute::GroupId)
    }
}

/// A security group attached to the load balancer: either a pre-existing
/// group by cloud ID or the stack's managed group by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityGroupAttachment {
    Id(String),
    Managed(Reference),
}

/// Kubernetes service endpoint a target group fronts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceRef {
    pub namespace: String,
    pub name: String,
    pub port: u16,
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.name, self.port)
    }
}

/// Where a listener rule sends matched traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleTarget {
    /// Forward to a target group in this stack
    TargetGroup(Reference),
    /// Return a fixed 404 without forwarding
    FixedNotFound,
}

// ============================================================================
// Resource specs
// ============================================================================

/// Desired load balancer attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    pub name: String,
    pub scheme: Scheme,
    pub subnet_ids: Vec<String>,
    pub security_groups: Vec<SecurityGroupAttachment>,
    pub tags: BTreeMap<String, String>,
    pub wafacl_id: Option<String>,
}

/// Desired listener attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerSpec {
    pub load_balancer: Reference,
    pub port: u16,
    pub protocol: Protocol,
    pub certificate_arn: Option<String>,
}

/// Desired listener rule.
///
/// The rule carrying [`RulePriority::Default`] has no conditions and maps
/// to the listener's fallback action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerRuleSpec {
    pub listener: Reference,
    pub priority: RulePriority,
    pub conditions: Vec<Condition>,
    pub target: RuleTarget,
}

/// Desired target group attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetGroupSpec {
    pub name: String,
    pub service: ServiceRef,
    pub port: u16,
    pub protocol: Protocol,
    pub target_type: TargetType,
    pub vpc_id: String,
    pub health_check: HealthCheck,
    pub attributes: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

/// Membership-sync responsibility for one target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetGroupBindingSpec {
    pub target_group: Reference,
    pub service: ServiceRef,
    pub target_type: TargetType,
}

/// Desired managed security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupSpec {
    pub name: String,
    pub description: String,
    pub vpc_id: String,
    pub tags: BTreeMap<String, String>,
}

/// Desired inbound rule on the managed security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupRuleSpec {
    pub security_group: Reference,
    pub protocol: String,
    pub port: u16,
    pub cidrs: Vec<String>,
}

/// The closed set of resource classes a stack may contain, in creation
/// order. Deletion runs in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    SecurityGroup,
    SecurityGroupRule,
    TargetGroup,
    LoadBalancer,
    Listener,
    ListenerRule,
    TargetGroupBinding,
}

impl ResourceKind {
    /// All kinds in creation order.
    pub const CREATION_ORDER: [Self; 7] = [
        Self::SecurityGroup,
        Self::SecurityGroupRule,
        Self::TargetGroup,
        Self::LoadBalancer,
        Self::Listener,
        Self::ListenerRule,
        Self::TargetGroupBinding,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SecurityGroup => "SecurityGroup",
            Self::SecurityGroupRule => "SecurityGroupRule",
            Self::TargetGroup => "TargetGroup",
            Self::LoadBalancer => "LoadBalancer",
            Self::Listener => "Listener",
            Self::ListenerRule => "ListenerRule",
            Self::TargetGroupBinding => "TargetGroupBinding",
        }
    }
}

/// A spec plus its class tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum Resource {
    LoadBalancer(LoadBalancerSpec),
    Listener(ListenerSpec),
    ListenerRule(ListenerRuleSpec),
    TargetGroup(TargetGroupSpec),
    TargetGroupBinding(TargetGroupBindingSpec),
    SecurityGroup(SecurityGroupSpec),
    SecurityGroupRule(SecurityGroupRuleSpec),
}

impl Resource {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::LoadBalancer(_) => ResourceKind::LoadBalancer,
            Self::Listener(_) => ResourceKind::Listener,
            Self::ListenerRule(_) => ResourceKind::ListenerRule,
            Self::TargetGroup(_) => ResourceKind::TargetGroup,
            Self::TargetGroupBinding(_) => ResourceKind::TargetGroupBinding,
            Self::SecurityGroup(_) => ResourceKind::SecurityGroup,
            Self::SecurityGroupRule(_) => ResourceKind::SecurityGroupRule,
        }
    }

    /// Every reference this spec carries.
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        match self {
            Self::LoadBalancer(spec) => spec
                .security_groups
                .iter()
                .filter_map(|sg| match sg {
                    SecurityGroupAttachment::Managed(r) => Some(r),
                    SecurityGroupAttachment::Id(_) => None,
                })
                .collect(),
            Self::Listener(spec) => vec![&spec.load_balancer],
            Self::ListenerRule(spec) => {
                let mut refs = vec![&spec.listener];
                if let RuleTarget::TargetGroup(r) = &spec.target {
                    refs.push(r);
                }
                refs
            }
            Self::TargetGroup(_) | Self::SecurityGroup(_) => Vec::new(),
            Self::TargetGroupBinding(spec) => vec![&spec.target_group],
            Self::SecurityGroupRule(spec) => vec![&spec.security_group],
        }
    }
}

// ============================================================================
// Stack
// ============================================================================

/// Structural problems found when validating a stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    #[error("duplicate logical id {0}")]
    DuplicateLogicalId(LogicalId),

    #[error("{from} references unknown spec {to}")]
    DanglingReference { from: LogicalId, to: LogicalId },

    #[error("reference cycle through {0}")]
    CyclicReference(LogicalId),

    #[error("stack must contain exactly one load balancer, found {0}")]
    LoadBalancerCount(usize),

    #[error("{id}: {detail}")]
    InvalidEdge { id: LogicalId, detail: String },

    #[error("listener {listener} has duplicate rule priority {priority}")]
    DuplicatePriority {
        listener: LogicalId,
        priority: u32,
    },

    #[error("listener {listener} rule priorities are not dense from 1")]
    NonDensePriorities { listener: LogicalId },

    #[error("listener {listener} must have exactly one default rule, found {count}")]
    DefaultRuleCount { listener: LogicalId, count: usize },

    #[error("default rule {0} must not carry conditions")]
    DefaultRuleConditions(LogicalId),
}

/// The desired topology for one group: all specs, keyed by logical id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    resources: BTreeMap<LogicalId, Resource>,
}

impl Stack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty stack: the desired state of a group in teardown.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Add a spec under a unique logical id.
    ///
    /// # Errors
    ///
    /// Fails if the id is already taken.
    pub fn add(&mut self, id: LogicalId, resource: Resource) -> Result<(), StackError> {
        if self.resources.contains_key(&id) {
            return Err(StackError::DuplicateLogicalId(id));
        }
        self.resources.insert(id, resource);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &LogicalId) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LogicalId, &Resource)> {
        self.resources.iter()
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = (&LogicalId, &Resource)> {
        self.resources.iter().filter(move |(_, r)| r.kind() == kind)
    }

    /// The stack's single load balancer, when the stack is non-empty.
    #[must_use]
    pub fn load_balancer(&self) -> Option<(&LogicalId, &LoadBalancerSpec)> {
        self.resources.iter().find_map(|(id, r)| match r {
            Resource::LoadBalancer(spec) => Some((id, spec)),
            _ => None,
        })
    }

    /// All listeners with their ids.
    #[must_use]
    pub fn listeners(&self) -> Vec<(&LogicalId, &ListenerSpec)> {
        self.resources
            .iter()
            .filter_map(|(id, r)| match r {
                Resource::Listener(spec) => Some((id, spec)),
                _ => None,
            })
            .collect()
    }

    /// All rules attached to the given listener.
    #[must_use]
    pub fn rules_of_listener(&self, listener: &LogicalId) -> Vec<(&LogicalId, &ListenerRuleSpec)> {
        self.resources
            .iter()
            .filter_map(|(id, r)| match r {
                Resource::ListenerRule(spec) if &spec.listener.target == listener => {
                    Some((id, spec))
                }
                _ => None,
            })
            .collect()
    }

    /// Serialize for logging.
    ///
    /// # Errors
    ///
    /// Fails only if serde serialization fails, which would be a bug.
    pub fn marshal(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Check every structural invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), StackError> {
        if self.is_empty() {
            return Ok(());
        }

        self.validate_references()?;
        self.validate_acyclic()?;
        self.validate_load_balancer()?;
        self.validate_edges()?;
        self.validate_rule_priorities()?;
        Ok(())
    }

    fn validate_references(&self) -> Result<(), StackError> {
        for (id, resource) in &self.resources {
            for reference in resource.references() {
                if !self.resources.contains_key(&reference.target) {
                    return Err(StackError::DanglingReference {
                        from: id.clone(),
                        to: reference.target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_acyclic(&self) -> Result<(), StackError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn visit(
            stack: &Stack,
            id: &LogicalId,
            colors: &mut HashMap<LogicalId, Color>,
        ) -> Result<(), StackError> {
            match colors.get(id).copied().unwrap_or(Color::White) {
                Color::Black => return Ok(()),
                Color::Gray => return Err(StackError::CyclicReference(id.clone())),
                Color::White => {}
            }
            colors.insert(id.clone(), Color::Gray);
            if let Some(resource) = stack.get(id) {
                for reference in resource.references() {
                    visit(stack, &reference.target, colors)?;
                }
            }
            colors.insert(id.clone(), Color::Black);
            Ok(())
        }

        let mut colors = HashMap::new();
        for id in self.resources.keys() {
            visit(self, id, &mut colors)?;
        }
        Ok(())
    }

    fn validate_load_balancer(&self) -> Result<(), StackError> {
        let count = self.of_kind(ResourceKind::LoadBalancer).count();
        if count != 1 {
            return Err(StackError::LoadBalancerCount(count));
        }
        Ok(())
    }

    fn validate_edges(&self) -> Result<(), StackError> {
        let invalid = |id: &LogicalId, detail: &str| StackError::InvalidEdge {
            id: id.clone(),
            detail: detail.to_string(),
        };

        for (id, resource) in &self.resources {
            match resource {
                Resource::Listener(spec) => {
                    if !matches!(
                        self.get(&spec.load_balancer.target),
                        Some(Resource::LoadBalancer(_))
                    ) {
                        return Err(invalid(id, "listener must reference the load balancer"));
                    }
                }
                Resource::ListenerRule(spec) => {
                    if !matches!(self.get(&spec.listener.target), Some(Resource::Listener(_))) {
                        return Err(invalid(id, "rule must reference a listener"));
                    }
                    match &spec.target {
                        RuleTarget::TargetGroup(r) => {
                            if !matches!(self.get(&r.target), Some(Resource::TargetGroup(_))) {
                                return Err(invalid(id, "rule must forward to a target group"));
                            }
                        }
                        RuleTarget::FixedNotFound => {
                            if spec.priority != RulePriority::Default {
                                return Err(invalid(
                                    id,
                                    "only the default rule may return a fixed response",
                                ));
                            }
                        }
                    }
                }
                Resource::TargetGroupBinding(spec) => {
                    if !matches!(
                        self.get(&spec.target_group.target),
                        Some(Resource::TargetGroup(_))
                    ) {
                        return Err(invalid(id, "binding must reference a target group"));
                    }
                }
                Resource::SecurityGroupRule(spec) => {
                    if !matches!(
                        self.get(&spec.security_group.target),
                        Some(Resource::SecurityGroup(_))
                    ) {
                        return Err(invalid(id, "rule must reference a security group"));
                    }
                }
                Resource::LoadBalancer(spec) => {
                    for sg in &spec.security_groups {
                        if let SecurityGroupAttachment::Managed(r) = sg {
                            if !matches!(self.get(&r.target), Some(Resource::SecurityGroup(_))) {
                                return Err(invalid(
                                    id,
                                    "managed attachment must reference a security group",
                                ));
                            }
                        }
                    }
                }
                Resource::TargetGroup(_) | Resource::SecurityGroup(_) => {}
            }
        }
        Ok(())
    }

    fn validate_rule_priorities(&self) -> Result<(), StackError> {
        for (listener_id, _) in self.listeners() {
            let rules = self.rules_of_listener(listener_id);

            let default_count = rules
                .iter()
                .filter(|(_, r)| r.priority == RulePriority::Default)
                .count();
            if default_count != 1 {
                return Err(StackError::DefaultRuleCount {
                    listener: listener_id.clone(),
                    count: default_count,
                });
            }
            for (rule_id, rule) in &rules {
                if rule.priority == RulePriority::Default && !rule.conditions.is_empty() {
                    return Err(StackError::DefaultRuleConditions((*rule_id).clone()));
                }
            }

            let mut numeric = BTreeSet::new();
            for (_, rule) in &rules {
                if let RulePriority::At(p) = rule.priority {
                    if !numeric.insert(p) {
                        return Err(StackError::DuplicatePriority {
                            listener: listener_id.clone(),
                            priority: p,
                        });
                    }
                }
            }
            let dense = numeric
                .iter()
                .enumerate()
                .all(|(i, p)| *p as usize == i + 1);
            if !dense {
                return Err(StackError::NonDensePriorities {
                    listener: listener_id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
