// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Diff engine.
//!
//! Compares the desired [`Stack`] against the assembled current
//! [`Topology`] and emits an ordered [`ActionPlan`]. Comparisons are
//! semantic rather than textual: ARNs compare case-insensitively, tag maps
//! and subnet lists compare order-insensitively, and security group
//! permissions compare as sets. Elements unpaired on the current side
//! become creates, unpaired on the desired side become deletes, and paired
//! elements contribute minimal modification sets.
//!
//! Pairing rules:
//! - load balancer: at most one per side, always paired;
//! - listener: by `(protocol, port)`; a protocol change therefore
//!   surfaces as delete-then-create, which is exactly the replace
//!   escalation the cloud API requires;
//! - listener rule: by `(listener, priority)`, with the default rule
//!   pairing on the listener's fallback action;
//! - target group: by deterministic name (which encodes the identity
//!   tuple);
//! - security group: by `Name` tag equal to the group id.

use crate::assembler::Topology;
use crate::aws::types::{
    Condition, ForwardAction, HealthCheck, IpPermission, RulePriority, TargetDescription,
    TargetHealth, TargetHealthState,
};
use crate::errors::ReconcileError;
use crate::labels::{TAG_GROUP, TAG_MANAGED_BY};
use crate::model::{
    LogicalId, Resource, ResourceKind, RuleTarget, SecurityGroupAttachment, Stack,
};
use std::collections::{BTreeMap, BTreeSet};

/// One planned operation against a resource class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<C> {
    /// Create the spec identified by `id` in the stack
    Create { id: LogicalId },
    /// Bring the paired cloud resource to the desired attributes
    Modify {
        id: LogicalId,
        cloud_id: String,
        changes: C,
    },
    /// Delete then re-create: the changed attributes cannot be modified
    Replace { id: LogicalId, cloud_id: String },
    /// Remove the unpaired cloud resource
    Delete { cloud_id: String },
}

/// Tag reconciliation: keys to set and keys to remove.
///
/// The ownership tags are never removed, whatever the desired map says.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagChanges {
    pub set: BTreeMap<String, String>,
    pub remove: Vec<String>,
}

impl TagChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// Compute tag changes, protecting the ownership keys from removal.
#[must_use]
pub fn diff_tags(
    desired: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> TagChanges {
    let mut set = BTreeMap::new();
    for (key, value) in desired {
        if current.get(key) != Some(value) {
            set.insert(key.clone(), value.clone());
        }
    }
    let remove = current
        .keys()
        .filter(|k| !desired.contains_key(*k))
        .filter(|k| k.as_str() != TAG_MANAGED_BY && k.as_str() != TAG_GROUP)
        .cloned()
        .collect();
    TagChanges { set, remove }
}

/// Minimal load balancer modification set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LbChanges {
    pub subnet_ids: Option<Vec<String>>,
    /// Attachments needing re-resolution at deploy time (a managed group
    /// may not exist yet when the diff runs)
    pub security_groups: Option<Vec<SecurityGroupAttachment>>,
    pub tags: TagChanges,
    /// `Some(new)` when the firewall ACL association changes, including
    /// `Some(None)` for disassociation
    pub wafacl: Option<Option<String>>,
}

impl LbChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subnet_ids.is_none()
            && self.security_groups.is_none()
            && self.tags.is_empty()
            && self.wafacl.is_none()
    }
}

/// Minimal listener modification set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerChanges {
    pub certificate_arn: Option<Option<String>>,
    /// New fallback action, from the stack's default rule
    pub default_action: Option<RuleTarget>,
}

impl ListenerChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificate_arn.is_none() && self.default_action.is_none()
    }
}

/// Replacement conditions and action for one modified rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleChanges {
    pub conditions: Vec<Condition>,
    pub target: RuleTarget,
}

/// Minimal target group modification set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TgChanges {
    pub health_check: Option<HealthCheck>,
    /// Attribute keys whose values differ; absent keys are left alone
    pub attributes: BTreeMap<String, String>,
    pub tags: TagChanges,
}

impl TgChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.health_check.is_none() && self.attributes.is_empty() && self.tags.is_empty()
    }
}

/// Per-listener rule operations, applied as one batch.
#[derive(Debug, Clone, Default)]
pub struct ListenerRuleActions {
    /// Logical id of the desired listener these rules belong to
    pub listener: LogicalId,
    /// Desired rule ids to create
    pub creates: Vec<LogicalId>,
    /// `(desired id, rule arn, changes)` for paired rules that differ
    pub modifies: Vec<(LogicalId, String, RuleChanges)>,
    /// ARNs of unpaired current rules
    pub deletes: Vec<String>,
}

impl ListenerRuleActions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.modifies.is_empty() && self.deletes.is_empty()
    }
}

/// The ordered plan: one action list per resource class, plus the
/// pairing seeds the deployer preloads into its resolution table.
#[derive(Debug, Clone, Default)]
pub struct ActionPlan {
    pub security_groups: Vec<Action<TagChanges>>,
    /// Grants against the managed security group (class SecurityGroupRule)
    pub permission_grants: Vec<IpPermission>,
    /// Revokes against the managed security group
    pub permission_revokes: Vec<IpPermission>,
    pub target_groups: Vec<Action<TgChanges>>,
    pub load_balancers: Vec<Action<LbChanges>>,
    pub listeners: Vec<Action<ListenerChanges>>,
    pub listener_rules: Vec<ListenerRuleActions>,
    /// Bindings whose registrations are reconciled at deploy time
    pub bindings: Vec<LogicalId>,
    /// `(logical id, attribute, cloud value)` for every paired resource
    pub pairings: Vec<(LogicalId, crate::model::Attribute, String)>,
}

impl ActionPlan {
    /// Number of mutating operations in the plan.
    ///
    /// Binding reconciliation is excluded: it always runs, and its own
    /// register/deregister sets are computed against live endpoints.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.security_groups.len()
            + self.permission_grants.len()
            + self.permission_revokes.len()
            + self.target_groups.len()
            + self.load_balancers.len()
            + self.listeners.len()
            + self
                .listener_rules
                .iter()
                .map(|r| r.creates.len() + r.modifies.len() + r.deletes.len())
                .sum::<usize>()
    }

    /// Whether the plan mutates nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutation_count() == 0
    }
}

fn arn_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn set_eq(a: &[String], b: &[String]) -> bool {
    let a: BTreeSet<&String> = a.iter().collect();
    let b: BTreeSet<&String> = b.iter().collect();
    a == b
}

/// Compute the full plan for one reconcile.
///
/// # Errors
///
/// Invariant violations when the stack refers to specs inconsistently;
/// a validated stack cannot trigger these.
pub fn diff(stack: &Stack, topology: &Topology) -> Result<ActionPlan, ReconcileError> {
    let mut plan = ActionPlan::default();

    diff_security_group(stack, topology, &mut plan);
    diff_target_groups(stack, topology, &mut plan)?;
    diff_load_balancer(stack, topology, &mut plan);
    diff_listeners(stack, topology, &mut plan)?;

    plan.bindings = stack
        .of_kind(ResourceKind::TargetGroupBinding)
        .map(|(id, _)| id.clone())
        .collect();

    Ok(plan)
}

fn diff_security_group(stack: &Stack, topology: &Topology, plan: &mut ActionPlan) {
    let desired = stack
        .of_kind(ResourceKind::SecurityGroup)
        .next()
        .map(|(id, r)| match r {
            Resource::SecurityGroup(spec) => (id.clone(), spec.clone()),
            _ => unreachable!("of_kind returned a non-security-group"),
        });
    let current = topology.security_group.as_ref();

    // Desired inbound permissions from the stack's rule specs
    let desired_permissions: Vec<IpPermission> = stack
        .of_kind(ResourceKind::SecurityGroupRule)
        .filter_map(|(_, r)| match r {
            Resource::SecurityGroupRule(spec) => Some(IpPermission {
                protocol: spec.protocol.clone(),
                from_port: spec.port,
                to_port: spec.port,
                cidrs: spec.cidrs.clone(),
                group_pairs: Vec::new(),
            }),
            _ => None,
        })
        .collect();

    match (desired, current) {
        (Some((id, spec)), Some(sg)) => {
            plan.pairings
                .push((id.clone(), crate::model::Attribute::GroupId, sg.id.clone()));
            let tags = diff_tags(&spec.tags, &sg.tags);
            if !tags.is_empty() {
                plan.security_groups.push(Action::Modify {
                    id,
                    cloud_id: sg.id.clone(),
                    changes: tags,
                });
            }
            plan.permission_grants = diff_ip_permissions(&desired_permissions, &sg.inbound);
            plan.permission_revokes = diff_ip_permissions(&sg.inbound, &desired_permissions);
        }
        (Some((id, _)), None) => {
            plan.security_groups.push(Action::Create { id });
            plan.permission_grants = desired_permissions;
        }
        (None, Some(sg)) => {
            // No revokes: the group is going away entirely
            plan.security_groups.push(Action::Delete {
                cloud_id: sg.id.clone(),
            });
        }
        (None, None) => {}
    }
}

fn diff_target_groups(
    stack: &Stack,
    topology: &Topology,
    plan: &mut ActionPlan,
) -> Result<(), ReconcileError> {
    let mut current_by_name: BTreeMap<&str, &crate::assembler::ObservedTargetGroup> = topology
        .target_groups
        .iter()
        .map(|tg| (tg.data.name.as_str(), tg))
        .collect();

    for (id, resource) in stack.of_kind(ResourceKind::TargetGroup) {
        let Resource::TargetGroup(spec) = resource else {
            continue;
        };
        match current_by_name.remove(spec.name.as_str()) {
            Some(observed) => {
                plan.pairings.push((
                    id.clone(),
                    crate::model::Attribute::Arn,
                    observed.data.arn.clone(),
                ));

                // The name encodes the identity tuple, so a mismatch here
                // means the hash scheme changed under us
                if observed.data.port != spec.port
                    || observed.data.protocol != spec.protocol
                    || observed.data.target_type != spec.target_type
                {
                    plan.target_groups.push(Action::Replace {
                        id: id.clone(),
                        cloud_id: observed.data.arn.clone(),
                    });
                    continue;
                }

                let changes = TgChanges {
                    health_check: (observed.data.health_check != spec.health_check)
                        .then(|| spec.health_check.clone()),
                    attributes: spec
                        .attributes
                        .iter()
                        .filter(|(k, v)| observed.attributes.get(*k) != Some(*v))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                    tags: diff_tags(&spec.tags, &observed.tags),
                };
                if !changes.is_empty() {
                    plan.target_groups.push(Action::Modify {
                        id: id.clone(),
                        cloud_id: observed.data.arn.clone(),
                        changes,
                    });
                }
            }
            None => plan.target_groups.push(Action::Create { id: id.clone() }),
        }
    }

    for observed in current_by_name.values() {
        plan.target_groups.push(Action::Delete {
            cloud_id: observed.data.arn.clone(),
        });
    }
    Ok(())
}

fn diff_load_balancer(stack: &Stack, topology: &Topology, plan: &mut ActionPlan) {
    let desired = stack.load_balancer();
    let current = topology.load_balancer.as_ref();

    match (desired, current) {
        (Some((id, spec)), Some(observed)) => {
            plan.pairings.push((
                id.clone(),
                crate::model::Attribute::Arn,
                observed.data.arn.clone(),
            ));
            plan.pairings.push((
                id.clone(),
                crate::model::Attribute::DnsName,
                observed.data.dns_name.clone(),
            ));

            if spec.scheme != observed.data.scheme {
                // Scheme is immutable in the cloud API
                plan.load_balancers.push(Action::Replace {
                    id: id.clone(),
                    cloud_id: observed.data.arn.clone(),
                });
                return;
            }

            let subnet_ids = (!set_eq(&spec.subnet_ids, &observed.data.subnet_ids))
                .then(|| spec.subnet_ids.clone());

            // Attachments resolve fully only once a managed group exists
            let desired_sg_ids: Option<Vec<String>> = spec
                .security_groups
                .iter()
                .map(|att| match att {
                    SecurityGroupAttachment::Id(id) => Some(id.clone()),
                    SecurityGroupAttachment::Managed(_) => {
                        topology.security_group.as_ref().map(|sg| sg.id.clone())
                    }
                })
                .collect();
            let security_groups = match desired_sg_ids {
                Some(ids) if set_eq(&ids, &observed.data.security_group_ids) => None,
                _ => Some(spec.security_groups.clone()),
            };

            let tags = diff_tags(&spec.tags, &observed.tags);
            let wafacl =
                (spec.wafacl_id != observed.wafacl_id).then(|| spec.wafacl_id.clone());

            let changes = LbChanges {
                subnet_ids,
                security_groups,
                tags,
                wafacl,
            };
            if !changes.is_empty() {
                plan.load_balancers.push(Action::Modify {
                    id: id.clone(),
                    cloud_id: observed.data.arn.clone(),
                    changes,
                });
            }
        }
        (Some((id, _)), None) => plan.load_balancers.push(Action::Create { id: id.clone() }),
        (None, Some(observed)) => plan.load_balancers.push(Action::Delete {
            cloud_id: observed.data.arn.clone(),
        }),
        (None, None) => {}
    }
}

fn diff_listeners(
    stack: &Stack,
    topology: &Topology,
    plan: &mut ActionPlan,
) -> Result<(), ReconcileError> {
    let desired: Vec<_> = stack.listeners();
    let mut matched_current: BTreeSet<&str> = BTreeSet::new();

    for (listener_id, spec) in &desired {
        let paired = topology.listeners.iter().find(|observed| {
            observed.data.port == spec.port && observed.data.protocol == spec.protocol
        });

        match paired {
            Some(observed) => {
                matched_current.insert(observed.data.arn.as_str());
                plan.pairings.push((
                    (*listener_id).clone(),
                    crate::model::Attribute::Arn,
                    observed.data.arn.clone(),
                ));

                let desired_default = default_rule_target(stack, listener_id)?;
                let mut changes = ListenerChanges::default();
                if spec.certificate_arn != observed.data.certificate_arn {
                    changes.certificate_arn = Some(spec.certificate_arn.clone());
                }
                if !rule_target_matches(&desired_default, &observed.data.default_action, stack, topology)
                {
                    changes.default_action = Some(desired_default.clone());
                }
                if !changes.is_empty() {
                    plan.listeners.push(Action::Modify {
                        id: (*listener_id).clone(),
                        cloud_id: observed.data.arn.clone(),
                        changes,
                    });
                }

                plan.listener_rules.push(diff_rules_of_listener(
                    stack,
                    topology,
                    listener_id,
                    &observed.rules,
                )?);
            }
            None => {
                plan.listeners.push(Action::Create {
                    id: (*listener_id).clone(),
                });
                // Every desired rule is new with the listener
                let creates = stack
                    .rules_of_listener(listener_id)
                    .into_iter()
                    .filter(|(_, r)| r.priority != RulePriority::Default)
                    .map(|(id, _)| id.clone())
                    .collect();
                plan.listener_rules.push(ListenerRuleActions {
                    listener: (*listener_id).clone(),
                    creates,
                    ..Default::default()
                });
            }
        }
    }

    for observed in &topology.listeners {
        if !matched_current.contains(observed.data.arn.as_str()) {
            plan.listeners.push(Action::Delete {
                cloud_id: observed.data.arn.clone(),
            });
        }
    }
    Ok(())
}

fn default_rule_target(
    stack: &Stack,
    listener_id: &LogicalId,
) -> Result<RuleTarget, ReconcileError> {
    stack
        .rules_of_listener(listener_id)
        .into_iter()
        .find(|(_, r)| r.priority == RulePriority::Default)
        .map(|(_, r)| r.target.clone())
        .ok_or_else(|| {
            ReconcileError::invariant(format!("listener {listener_id} has no default rule"))
        })
}

/// Whether a desired rule target already matches a current forward action.
fn rule_target_matches(
    desired: &RuleTarget,
    current: &ForwardAction,
    stack: &Stack,
    topology: &Topology,
) -> bool {
    match (desired, current) {
        (RuleTarget::FixedNotFound, ForwardAction::FixedResponse { status_code }) => {
            *status_code == 404
        }
        (RuleTarget::TargetGroup(reference), ForwardAction::Forward { target_group_arn }) => {
            // Resolve the reference to the paired current group's ARN via
            // the deterministic name
            let Some(Resource::TargetGroup(spec)) = stack.get(&reference.target) else {
                return false;
            };
            topology
                .target_groups
                .iter()
                .any(|tg| tg.data.name == spec.name && arn_eq(&tg.data.arn, target_group_arn))
        }
        _ => false,
    }
}

fn diff_rules_of_listener(
    stack: &Stack,
    topology: &Topology,
    listener_id: &LogicalId,
    current_rules: &[crate::aws::types::RuleData],
) -> Result<ListenerRuleActions, ReconcileError> {
    let mut actions = ListenerRuleActions {
        listener: listener_id.clone(),
        ..Default::default()
    };

    let mut current_by_priority: BTreeMap<u32, &crate::aws::types::RuleData> = BTreeMap::new();
    for rule in current_rules {
        if let RulePriority::At(p) = rule.priority {
            current_by_priority.insert(p, rule);
        }
    }

    for (rule_id, spec) in stack.rules_of_listener(listener_id) {
        let RulePriority::At(priority) = spec.priority else {
            continue; // the default rule reconciles through the listener
        };
        match current_by_priority.remove(&priority) {
            Some(current) => {
                let conditions_match = conditions_eq(&spec.conditions, &current.conditions);
                let target_matches =
                    rule_target_matches(&spec.target, &current.action, stack, topology);
                if !conditions_match || !target_matches {
                    actions.modifies.push((
                        rule_id.clone(),
                        current.arn.clone(),
                        RuleChanges {
                            conditions: spec.conditions.clone(),
                            target: spec.target.clone(),
                        },
                    ));
                }
            }
            None => actions.creates.push(rule_id.clone()),
        }
    }

    for rule in current_by_priority.values() {
        actions.deletes.push(rule.arn.clone());
    }
    Ok(actions)
}

/// Condition equality, order-insensitive.
fn conditions_eq(a: &[Condition], b: &[Condition]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|c| b.contains(c)) && b.iter().all(|c| a.contains(c))
}

// ============================================================================
// Set-semantic helpers
// ============================================================================

/// Set difference `source - target` over semantic permission equality.
#[must_use]
pub fn diff_ip_permissions(
    source: &[IpPermission],
    target: &[IpPermission],
) -> Vec<IpPermission> {
    source
        .iter()
        .filter(|s| !target.iter().any(|t| ip_permission_equals(s, t)))
        .cloned()
        .collect()
}

/// Permission equality over `(protocol, fromPort, toPort)` with the CIDR
/// and group-pair lists compared as sets.
#[must_use]
pub fn ip_permission_equals(a: &IpPermission, b: &IpPermission) -> bool {
    if a.protocol != b.protocol || a.from_port != b.from_port || a.to_port != b.to_port {
        return false;
    }
    let cidrs_a: BTreeSet<&String> = a.cidrs.iter().collect();
    let cidrs_b: BTreeSet<&String> = b.cidrs.iter().collect();
    if cidrs_a != cidrs_b {
        return false;
    }
    // Pair equality is by group id only; the cross-account user id is
    // deliberately ignored for compatibility
    let pairs_a: BTreeSet<&String> = a.group_pairs.iter().map(|p| &p.group_id).collect();
    let pairs_b: BTreeSet<&String> = b.group_pairs.iter().map(|p| &p.group_id).collect();
    pairs_a == pairs_b
}

/// Register/deregister sets for one target group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetReconcile {
    pub register: Vec<TargetDescription>,
    pub deregister: Vec<TargetDescription>,
}

impl TargetReconcile {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.register.is_empty() && self.deregister.is_empty()
    }
}

/// Compute registration changes, pairing targets by `(id, port)`.
///
/// Draining targets are present-but-terminal: they are neither
/// re-registered nor deregistered again.
#[must_use]
pub fn diff_targets(desired: &[TargetDescription], current: &[TargetHealth]) -> TargetReconcile {
    let register = desired
        .iter()
        .filter(|d| !current.iter().any(|c| &c.target == *d))
        .cloned()
        .collect();

    let deregister = current
        .iter()
        .filter(|c| c.state != TargetHealthState::Draining)
        .filter(|c| !desired.contains(&c.target))
        .map(|c| c.target.clone())
        .collect();

    TargetReconcile {
        register,
        deregister,
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
