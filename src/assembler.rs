// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Current-state assembler.
//!
//! Rebuilds the cloud-side topology that belongs to one group, purely by
//! tag discovery: only resources carrying `managed-by=<controller-id>` and
//! `group=<group-id>` are considered, so resources created by anyone else
//! are invisible to the diff and can never be mutated. Target groups are
//! discovered independently of the load balancer so a partially-created
//! stack from an interrupted reconcile is still observed and adopted.

use crate::aws::types::{ListenerData, LoadBalancerData, RuleData, SecurityGroupData, TargetGroupData, TargetHealth};
use crate::aws::Cloud;
use crate::config::ControllerConfig;
use crate::errors::ReconcileError;
use crate::ingress::group::GroupId;
use crate::labels::{TAG_GROUP, TAG_MANAGED_BY, TAG_NAME};
use std::collections::BTreeMap;
use tracing::debug;

/// A load balancer with its tags and firewall association.
#[derive(Debug, Clone)]
pub struct ObservedLoadBalancer {
    pub data: LoadBalancerData,
    pub tags: BTreeMap<String, String>,
    pub wafacl_id: Option<String>,
}

/// A listener with its rules, as read.
#[derive(Debug, Clone)]
pub struct ObservedListener {
    pub data: ListenerData,
    pub rules: Vec<RuleData>,
}

/// A target group with its tags, attributes, and registrations.
#[derive(Debug, Clone)]
pub struct ObservedTargetGroup {
    pub data: TargetGroupData,
    pub tags: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, String>,
    pub targets: Vec<TargetHealth>,
}

/// The group's current cloud topology.
///
/// Shaped like the desired stack, but every node carries its cloud
/// identifier and last-read attributes, and reference edges are realized.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub load_balancer: Option<ObservedLoadBalancer>,
    pub listeners: Vec<ObservedListener>,
    pub target_groups: Vec<ObservedTargetGroup>,
    pub security_group: Option<SecurityGroupData>,
}

impl Topology {
    /// Whether nothing owned by the group exists in the cloud.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.load_balancer.is_none()
            && self.listeners.is_empty()
            && self.target_groups.is_empty()
            && self.security_group.is_none()
    }
}

/// The ownership tag pair for one group.
#[must_use]
pub fn ownership_tags(config: &ControllerConfig, group: &GroupId) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert(TAG_MANAGED_BY.to_string(), config.controller_id.clone());
    tags.insert(TAG_GROUP.to_string(), group.as_string());
    tags
}

/// Assemble the current topology for one group.
///
/// # Errors
///
/// More than one tagged load balancer (or managed security group) is an
/// invariant violation; cloud failures propagate.
pub async fn assemble(
    cloud: &Cloud,
    config: &ControllerConfig,
    group: &GroupId,
) -> Result<Topology, ReconcileError> {
    let tags = ownership_tags(config, group);

    let mut load_balancers = cloud.find_load_balancers_by_tags(&tags).await?;
    if load_balancers.len() > 1 {
        return Err(ReconcileError::invariant(format!(
            "group {group} owns {} load balancers, expected at most one",
            load_balancers.len()
        )));
    }

    let load_balancer = match load_balancers.pop() {
        Some(lb) => {
            let lb_tags = cloud.describe_tags(&lb.arn).await?;
            let wafacl_id = cloud.get_web_acl_for_resource(&lb.arn).await?;
            Some(ObservedLoadBalancer {
                data: lb,
                tags: lb_tags,
                wafacl_id,
            })
        }
        None => None,
    };

    let mut listeners = Vec::new();
    if let Some(lb) = &load_balancer {
        for listener in cloud.describe_listeners(&lb.data.arn).await? {
            let rules = cloud.describe_rules(&listener.arn).await?;
            listeners.push(ObservedListener {
                data: listener,
                rules,
            });
        }
    }

    // Target groups discover independently of the LB so partial creations
    // from an aborted deploy are adopted rather than duplicated
    let mut target_groups = Vec::new();
    for tg in cloud.find_target_groups_by_tags(&tags).await? {
        let tg_tags = cloud.describe_tags(&tg.arn).await?;
        let attributes = cloud.describe_target_group_attributes(&tg.arn).await?;
        let targets = cloud.describe_target_health(&tg.arn).await?;
        target_groups.push(ObservedTargetGroup {
            data: tg,
            tags: tg_tags,
            attributes,
            targets,
        });
    }

    let group_string = group.as_string();
    let candidates = cloud
        .describe_security_groups_by_name_tags(std::slice::from_ref(&group_string))
        .await?;
    let mut managed: Vec<SecurityGroupData> = candidates
        .into_iter()
        .filter(|sg| {
            sg.tags.get(TAG_MANAGED_BY) == Some(&config.controller_id)
                && sg.tags.get(TAG_NAME) == Some(&group_string)
        })
        .collect();
    if managed.len() > 1 {
        return Err(ReconcileError::invariant(format!(
            "group {group} owns {} managed security groups, expected at most one",
            managed.len()
        )));
    }
    let security_group = managed.pop();

    debug!(
        group = %group,
        has_lb = load_balancer.is_some(),
        listeners = listeners.len(),
        target_groups = target_groups.len(),
        has_sg = security_group.is_some(),
        "assembled current topology"
    );

    Ok(Topology {
        load_balancer,
        listeners,
        target_groups,
        security_group,
    })
}

#[cfg(test)]
#[path = "assembler_tests.rs"]
mod assembler_tests;
