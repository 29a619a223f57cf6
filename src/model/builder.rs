// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state builder.
//!
//! Turns one loaded group plus its parsed annotations into a validated
//! [`Stack`]. Load-balancer-scoped attributes are merged first-member-wins
//! with conflicts reported as validation errors; rule-scoped attributes
//! (certificate, backend protocol, health check, target type) apply per
//! member, except that members sharing a backend tuple must agree on its
//! health check. An empty member list produces an empty stack, which is
//! how teardown flows through the same pipeline.

use crate::annotations::IngressAnnotations;
use crate::aws::types::{Condition, Protocol, RulePriority, Scheme, TargetType};
use crate::errors::ReconcileError;
use crate::ingress::group::{GroupId, Member};
use crate::labels::{TAG_GROUP, TAG_MANAGED_BY, TAG_NAME};
use crate::model::naming;
use crate::model::{
    Attribute, ListenerRuleSpec, ListenerSpec, LoadBalancerSpec, LogicalId, Reference, Resource,
    RuleTarget, SecurityGroupAttachment, SecurityGroupRuleSpec, SecurityGroupSpec, ServiceRef,
    Stack, TargetGroupBindingSpec, TargetGroupSpec,
};
use k8s_openapi::api::networking::v1::{Ingress, IngressBackend};
use std::collections::{BTreeMap, BTreeSet};

/// One active member together with its decoded annotations.
pub struct MemberConfig {
    pub member: Member,
    pub annotations: IngressAnnotations,
}

impl MemberConfig {
    fn label(&self) -> String {
        format!("{}/{}", self.member.namespace(), self.member.name())
    }
}

/// Load-balancer-scoped attributes after the first-member-wins merge.
///
/// Subnet and security group values are still symbolic tokens at this
/// point; the resolvers turn them into cloud IDs before the stack is
/// built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedLbAttributes {
    pub scheme: Scheme,
    pub subnet_tokens: Vec<String>,
    pub security_group_tokens: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub wafacl_id: Option<String>,
    pub inbound_cidrs: Vec<String>,
}

/// Merge the load-balancer-scoped annotation fields across members.
///
/// The first member to set a field wins; a later member setting a
/// *different* value is a group-consistency error naming both members.
///
/// # Errors
///
/// Validation errors on conflicts, or when no member sets a required
/// field (scheme, subnets).
pub fn merge_lb_attributes(configs: &[MemberConfig]) -> Result<MergedLbAttributes, ReconcileError> {
    let mut scheme: Option<(Scheme, String)> = None;
    let mut subnets: Option<(Vec<String>, String)> = None;
    let mut security_groups: Option<(Vec<String>, String)> = None;
    let mut wafacl: Option<(String, String)> = None;
    let mut inbound_cidrs: Option<(Vec<String>, String)> = None;
    let mut tags: BTreeMap<String, (String, String)> = BTreeMap::new();

    for config in configs {
        let label = config.label();
        let ann = &config.annotations;

        if let Some(value) = ann.scheme {
            match &scheme {
                None => scheme = Some((value, label.clone())),
                Some((existing, owner)) if *existing != value => {
                    return Err(conflict("scheme", owner, &label));
                }
                Some(_) => {}
            }
        }
        if !ann.subnets.is_empty() {
            match &subnets {
                None => subnets = Some((ann.subnets.clone(), label.clone())),
                Some((existing, owner)) if *existing != ann.subnets => {
                    return Err(conflict("subnets", owner, &label));
                }
                Some(_) => {}
            }
        }
        if !ann.security_groups.is_empty() {
            match &security_groups {
                None => security_groups = Some((ann.security_groups.clone(), label.clone())),
                Some((existing, owner)) if *existing != ann.security_groups => {
                    return Err(conflict("security-groups", owner, &label));
                }
                Some(_) => {}
            }
        }
        if let Some(value) = &ann.wafacl_id {
            match &wafacl {
                None => wafacl = Some((value.clone(), label.clone())),
                Some((existing, owner)) if existing != value => {
                    return Err(conflict("wafacl-id", owner, &label));
                }
                Some(_) => {}
            }
        }
        if !ann.inbound_cidrs.is_empty() {
            match &inbound_cidrs {
                None => inbound_cidrs = Some((ann.inbound_cidrs.clone(), label.clone())),
                Some((existing, owner)) if *existing != ann.inbound_cidrs => {
                    return Err(conflict("inbound-cidrs", owner, &label));
                }
                Some(_) => {}
            }
        }
        for (key, value) in &ann.tags {
            match tags.get(key) {
                None => {
                    tags.insert(key.clone(), (value.clone(), label.clone()));
                }
                Some((existing, owner)) if existing != value => {
                    return Err(ReconcileError::validation(format!(
                        "conflicting tag `{key}` across group members {owner} and {label}"
                    )));
                }
                Some(_) => {}
            }
        }
    }

    let (scheme, _) = scheme.ok_or_else(|| {
        ReconcileError::validation("no group member sets the scheme annotation")
    })?;
    let (subnet_tokens, _) = subnets.ok_or_else(|| {
        ReconcileError::validation("no group member sets the subnets annotation")
    })?;

    Ok(MergedLbAttributes {
        scheme,
        subnet_tokens,
        security_group_tokens: security_groups.map(|(v, _)| v).unwrap_or_default(),
        tags: tags.into_iter().map(|(k, (v, _))| (k, v)).collect(),
        wafacl_id: wafacl.map(|(v, _)| v),
        inbound_cidrs: inbound_cidrs
            .map(|(v, _)| v)
            .unwrap_or_else(|| vec!["0.0.0.0/0".to_string()]),
    })
}

fn conflict(field: &str, first: &str, second: &str) -> ReconcileError {
    ReconcileError::validation(format!(
        "conflicting {field} annotation across group members {first} and {second}"
    ))
}

/// Resolved, merged load-balancer configuration the builder consumes.
#[derive(Debug, Clone)]
pub struct ResolvedLbConfig {
    pub scheme: Scheme,
    /// Subnet IDs after resolution and validation
    pub subnet_ids: Vec<String>,
    /// Security group IDs after resolution; empty means the controller
    /// manages an implicit group
    pub security_group_ids: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub wafacl_id: Option<String>,
    pub inbound_cidrs: Vec<String>,
}

/// Context constants threaded through one build.
pub struct BuildContext<'a> {
    pub group_id: &'a GroupId,
    pub controller_id: &'a str,
    pub vpc_id: &'a str,
}

const LB_ID: &str = "LoadBalancer";
const SG_ID: &str = "SecurityGroup";

/// Build the desired stack for one group.
///
/// An empty member list yields an empty (teardown) stack. The returned
/// stack has passed full invariant validation.
///
/// # Errors
///
/// Validation errors for malformed routing specs; invariant violations if
/// the built stack fails structural validation (a builder bug).
pub fn build_stack(
    ctx: &BuildContext<'_>,
    configs: &[MemberConfig],
    lb: &ResolvedLbConfig,
) -> Result<Stack, ReconcileError> {
    let mut stack = Stack::new();
    if configs.is_empty() {
        return Ok(stack);
    }

    let group = ctx.group_id.as_string();
    let mut base_tags = lb.tags.clone();
    // Ownership tags always win over user tags
    base_tags.insert(TAG_MANAGED_BY.to_string(), ctx.controller_id.to_string());
    base_tags.insert(TAG_GROUP.to_string(), group.clone());

    let add = |stack: &mut Stack, id: LogicalId, resource: Resource| {
        stack
            .add(id, resource)
            .map_err(|e| ReconcileError::invariant(e.to_string()))
    };

    // Listener ports: union across members, ascending
    let ports: BTreeSet<u16> = configs
        .iter()
        .flat_map(|c| c.annotations.effective_listen_ports())
        .collect();

    // Managed security group when none is supplied
    let managed_sg = lb.security_group_ids.is_empty();
    if managed_sg {
        let mut sg_tags = base_tags.clone();
        sg_tags.insert(TAG_NAME.to_string(), group.clone());
        add(
            &mut stack,
            LogicalId::new(SG_ID),
            Resource::SecurityGroup(SecurityGroupSpec {
                name: naming::security_group_name(&group),
                description: format!("managed by {} for group {group}", ctx.controller_id),
                vpc_id: ctx.vpc_id.to_string(),
                tags: sg_tags,
            }),
        )?;
        for port in &ports {
            add(
                &mut stack,
                LogicalId::new(format!("{SG_ID}/Rule/{port}")),
                Resource::SecurityGroupRule(SecurityGroupRuleSpec {
                    security_group: Reference::group_id(LogicalId::new(SG_ID)),
                    protocol: "tcp".to_string(),
                    port: *port,
                    cidrs: lb.inbound_cidrs.clone(),
                }),
            )?;
        }
    }

    // The one load balancer
    let security_groups = if managed_sg {
        vec![SecurityGroupAttachment::Managed(Reference::group_id(
            LogicalId::new(SG_ID),
        ))]
    } else {
        lb.security_group_ids
            .iter()
            .cloned()
            .map(SecurityGroupAttachment::Id)
            .collect()
    };
    add(
        &mut stack,
        LogicalId::new(LB_ID),
        Resource::LoadBalancer(LoadBalancerSpec {
            name: naming::load_balancer_name(&group),
            scheme: lb.scheme,
            subnet_ids: lb.subnet_ids.clone(),
            security_groups,
            tags: base_tags.clone(),
            wafacl_id: lb.wafacl_id.clone(),
        }),
    )?;

    // Target groups are keyed by (service, servicePort, targetType,
    // protocol): the same identity the cloud name encodes, so the
    // assembler can pair them. The health check is not part of the key;
    // members sharing a tuple must agree on it, and a mismatch is a
    // group-consistency error like any other annotation conflict.
    let mut tg_ids: BTreeMap<(ServiceRef, TargetType, Protocol), (LogicalId, String)> =
        BTreeMap::new();
    let mut emit_target_group = |stack: &mut Stack,
                                 service: ServiceRef,
                                 config: &MemberConfig|
     -> Result<LogicalId, ReconcileError> {
        let key = (
            service.clone(),
            config.annotations.target_type,
            config.annotations.backend_protocol,
        );
        if let Some((id, owner)) = tg_ids.get(&key) {
            let existing = match stack.get(id) {
                Some(Resource::TargetGroup(spec)) => spec,
                _ => return Err(ReconcileError::invariant(format!("missing target group {id}"))),
            };
            if existing.health_check != config.annotations.health_check {
                return Err(ReconcileError::validation(format!(
                    "conflicting health check for backend {service} across group members \
                     {owner} and {}",
                    config.label()
                )));
            }
            return Ok(id.clone());
        }
        let id = LogicalId::new(format!("TargetGroup/{service}"));
        let name = naming::target_group_name(
            &group,
            &service,
            config.annotations.target_type,
            config.annotations.backend_protocol,
        );
        stack
            .add(
                id.clone(),
                Resource::TargetGroup(TargetGroupSpec {
                    name,
                    service: service.clone(),
                    port: service.port,
                    protocol: config.annotations.backend_protocol,
                    target_type: config.annotations.target_type,
                    vpc_id: ctx.vpc_id.to_string(),
                    health_check: config.annotations.health_check.clone(),
                    attributes: config.annotations.target_group_attributes.clone(),
                    tags: base_tags.clone(),
                }),
            )
            .map_err(|e| ReconcileError::invariant(e.to_string()))?;
        stack
            .add(
                LogicalId::new(format!("TargetGroupBinding/{service}")),
                Resource::TargetGroupBinding(TargetGroupBindingSpec {
                    target_group: Reference::arn(id.clone()),
                    service,
                    target_type: config.annotations.target_type,
                }),
            )
            .map_err(|e| ReconcileError::invariant(e.to_string()))?;
        tg_ids.insert(key, (id.clone(), config.label()));
        Ok(id)
    };

    // Expand every member's host/path pairs into raw rules, member order
    let mut raw_rules = Vec::new();
    for config in configs {
        for raw in expand_member_rules(&config.member.ingress)? {
            let tg_id = emit_target_group(&mut stack, raw.service.clone(), config)?;
            raw_rules.push((raw, tg_id));
        }
    }

    // Default backend: the first member declaring one wins
    let default_target = configs
        .iter()
        .find_map(|config| {
            config
                .member
                .ingress
                .spec
                .as_ref()
                .and_then(|s| s.default_backend.as_ref())
                .map(|backend| (config, backend))
        })
        .map(|(config, backend)| {
            let service = service_of_backend(backend, &config.member.ingress)?;
            emit_target_group(&mut stack, service, config)
        })
        .transpose()?;

    // Rules per listener: within a host, longest literal prefix first,
    // ties broken by member order; priorities dense from 1
    let ordered = order_rules(raw_rules);

    let mut certificate_by_port: BTreeMap<u16, String> = BTreeMap::new();
    for config in configs {
        if let Some(cert) = &config.annotations.certificate_arn {
            for port in config.annotations.effective_listen_ports() {
                certificate_by_port.entry(port).or_insert_with(|| cert.clone());
            }
        }
    }

    for port in &ports {
        let certificate_arn = certificate_by_port.get(port).cloned();
        let protocol = if certificate_arn.is_some() {
            Protocol::Https
        } else {
            Protocol::Http
        };
        let listener_id = LogicalId::new(format!("Listener/{port}"));
        add(
            &mut stack,
            listener_id.clone(),
            Resource::Listener(ListenerSpec {
                load_balancer: Reference::arn(LogicalId::new(LB_ID)),
                port: *port,
                protocol,
                certificate_arn,
            }),
        )?;

        for (priority, (raw, tg_id)) in ordered.iter().enumerate() {
            let mut conditions = Vec::new();
            if let Some(host) = &raw.host {
                conditions.push(Condition::HostHeader(host.clone()));
            }
            conditions.push(Condition::PathPattern(raw.path.clone()));
            let priority = u32::try_from(priority + 1)
                .map_err(|_| ReconcileError::invariant("rule priority overflow"))?;
            add(
                &mut stack,
                LogicalId::new(format!("Listener/{port}/Rule/{priority}")),
                Resource::ListenerRule(ListenerRuleSpec {
                    listener: Reference::arn(listener_id.clone()),
                    priority: RulePriority::At(priority),
                    conditions,
                    target: RuleTarget::TargetGroup(Reference::arn(tg_id.clone())),
                }),
            )?;
        }

        // Default rule: declared default backend, else a fixed 404
        add(
            &mut stack,
            LogicalId::new(format!("Listener/{port}/Rule/default")),
            Resource::ListenerRule(ListenerRuleSpec {
                listener: Reference::arn(listener_id.clone()),
                priority: RulePriority::Default,
                conditions: Vec::new(),
                target: match &default_target {
                    Some(tg_id) => RuleTarget::TargetGroup(Reference::arn(tg_id.clone())),
                    None => RuleTarget::FixedNotFound,
                },
            }),
        )?;
    }

    stack
        .validate()
        .map_err(|e| ReconcileError::invariant(format!("built stack failed validation: {e}")))?;
    Ok(stack)
}

/// One host/path pair extracted from a member's routing spec.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawRule {
    host: Option<String>,
    path: String,
    service: ServiceRef,
}

fn expand_member_rules(ingress: &Ingress) -> Result<Vec<RawRule>, ReconcileError> {
    let mut rules = Vec::new();
    let Some(spec) = ingress.spec.as_ref() else {
        return Ok(rules);
    };

    for rule in spec.rules.iter().flatten() {
        let host = rule.host.clone().filter(|h| !h.is_empty());
        let Some(http) = rule.http.as_ref() else {
            continue;
        };
        for path in &http.paths {
            let service = service_of_backend(&path.backend, ingress)?;
            let path = match path.path.as_deref().filter(|p| !p.is_empty()) {
                Some(p) => p.to_string(),
                None => "/".to_string(),
            };
            rules.push(RawRule {
                host: host.clone(),
                path,
                service,
            });
        }
    }
    Ok(rules)
}

fn service_of_backend(
    backend: &IngressBackend,
    ingress: &Ingress,
) -> Result<ServiceRef, ReconcileError> {
    let namespace = ingress
        .metadata
        .namespace
        .clone()
        .unwrap_or_default();
    let owner = format!(
        "{namespace}/{}",
        ingress.metadata.name.clone().unwrap_or_default()
    );

    let service = backend.service.as_ref().ok_or_else(|| {
        ReconcileError::validation(format!("{owner}: backend without a service reference"))
    })?;
    let port = service
        .port
        .as_ref()
        .and_then(|p| p.number)
        .ok_or_else(|| {
            ReconcileError::validation(format!(
                "{owner}: backend service {} must use a numeric port",
                service.name
            ))
        })?;
    let port = u16::try_from(port).map_err(|_| {
        ReconcileError::validation(format!(
            "{owner}: backend service {} port {port} out of range",
            service.name
        ))
    })?;

    Ok(ServiceRef {
        namespace,
        name: service.name.clone(),
        port,
    })
}

/// Order raw rules for priority assignment.
///
/// Hosts keep first-appearance order; within a host, paths sort by
/// descending literal prefix length, with the stable sort preserving
/// member order on ties.
fn order_rules(raw: Vec<(RawRule, LogicalId)>) -> Vec<(RawRule, LogicalId)> {
    let mut host_order: Vec<Option<String>> = Vec::new();
    for (rule, _) in &raw {
        if !host_order.contains(&rule.host) {
            host_order.push(rule.host.clone());
        }
    }

    let mut ordered = Vec::new();
    for host in host_order {
        let mut bucket: Vec<(RawRule, LogicalId)> = raw
            .iter()
            .filter(|(r, _)| r.host == host)
            .cloned()
            .collect();
        bucket.sort_by_key(|(r, _)| std::cmp::Reverse(literal_prefix_len(&r.path)));
        ordered.extend(bucket);
    }
    ordered
}

/// Length of the path's literal prefix, up to the first wildcard.
fn literal_prefix_len(path: &str) -> usize {
    path.find(['*', '?']).unwrap_or(path.len())
}

/// The `(logical id, attribute)` of the stack's load balancer DNS name.
///
/// Resolved by the deployer after the deploy commits; the value is what
/// gets published to member statuses.
#[must_use]
pub fn load_balancer_dns_reference() -> Reference {
    Reference::new(LogicalId::new(LB_ID), Attribute::DnsName)
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod builder_tests;
