// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`CloudApi`] implementation for tests and hermetic runs.
//!
//! Models just enough provider behavior for the reconciliation core:
//! unique-name conflicts on create, not-found on delete, tag storage,
//! listener/rule hierarchies, and target registration state. Individual
//! calls can be made to fail once via [`InMemoryCloud::fail_next`] for
//! partial-failure tests.
//!
//! The production transport is an external collaborator: deployment
//! builds link a crate implementing [`CloudApi`] over the provider SDK
//! and hand it to [`crate::aws::Cloud::new`].

use crate::aws::api::{CloudApi, CloudResult};
use crate::aws::types::{
    Condition, CreateListenerInput, CreateLoadBalancerInput, CreateRuleInput,
    CreateSecurityGroupInput, CreateTargetGroupInput, ForwardAction, HealthCheck, IpPermission,
    ListenerData, LoadBalancerData, Page, RuleData, RulePriority, SecurityGroupData, SubnetData,
    TargetDescription, TargetGroupData, TargetHealth, TargetHealthState,
};
use crate::errors::{CloudError, CloudErrorKind};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct CloudState {
    load_balancers: HashMap<String, LoadBalancerData>,
    listeners: HashMap<String, ListenerData>,
    rules: HashMap<String, RuleData>,
    target_groups: HashMap<String, TargetGroupData>,
    tg_attributes: HashMap<String, BTreeMap<String, String>>,
    registrations: HashMap<String, Vec<TargetHealth>>,
    security_groups: HashMap<String, SecurityGroupData>,
    subnets: Vec<SubnetData>,
    tags: HashMap<String, BTreeMap<String, String>>,
    web_acls: HashMap<String, String>,
    fail_next: HashMap<String, VecDeque<CloudError>>,
    calls: Vec<String>,
}

/// In-memory cloud for tests.
#[derive(Default)]
pub struct InMemoryCloud {
    state: Mutex<CloudState>,
    sequence: AtomicU64,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Seed a subnet visible to the describe-subnet calls.
    pub fn add_subnet(&self, id: &str, availability_zone: &str, name_tag: Option<&str>) {
        self.state.lock().unwrap().subnets.push(SubnetData {
            id: id.to_string(),
            availability_zone: availability_zone.to_string(),
            name_tag: name_tag.map(str::to_string),
        });
    }

    /// Seed a pre-existing security group (for ID/tag resolution tests).
    pub fn add_security_group(&self, sg: SecurityGroupData) {
        let mut state = self.state.lock().unwrap();
        state
            .tags
            .insert(sg.id.clone(), sg.tags.clone());
        state.security_groups.insert(sg.id.clone(), sg);
    }

    /// Make the next invocation of `operation` fail with `err`.
    pub fn fail_next(&self, operation: &str, err: CloudError) {
        self.state
            .lock()
            .unwrap()
            .fail_next
            .entry(operation.to_string())
            .or_default()
            .push_back(err);
    }

    /// Force a registered target into a specific health state.
    pub fn set_target_state(&self, tg_arn: &str, target: &TargetDescription, state: TargetHealthState) {
        let mut guard = self.state.lock().unwrap();
        if let Some(regs) = guard.registrations.get_mut(tg_arn) {
            for th in regs.iter_mut() {
                if &th.target == target {
                    th.state = state;
                }
            }
        }
    }

    /// Every call made so far, by operation name, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Count of calls to one operation.
    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    pub fn load_balancers(&self) -> Vec<LoadBalancerData> {
        self.state
            .lock()
            .unwrap()
            .load_balancers
            .values()
            .cloned()
            .collect()
    }

    pub fn listeners(&self) -> Vec<ListenerData> {
        self.state.lock().unwrap().listeners.values().cloned().collect()
    }

    pub fn rules(&self) -> Vec<RuleData> {
        self.state.lock().unwrap().rules.values().cloned().collect()
    }

    pub fn target_groups(&self) -> Vec<TargetGroupData> {
        self.state
            .lock()
            .unwrap()
            .target_groups
            .values()
            .cloned()
            .collect()
    }

    pub fn security_groups(&self) -> Vec<SecurityGroupData> {
        self.state
            .lock()
            .unwrap()
            .security_groups
            .values()
            .cloned()
            .collect()
    }

    pub fn registered_targets(&self, tg_arn: &str) -> Vec<TargetHealth> {
        self.state
            .lock()
            .unwrap()
            .registrations
            .get(tg_arn)
            .cloned()
            .unwrap_or_default()
    }

    pub fn tags_of(&self, arn: &str) -> BTreeMap<String, String> {
        self.state
            .lock()
            .unwrap()
            .tags
            .get(arn)
            .cloned()
            .unwrap_or_default()
    }

    pub fn web_acl_of(&self, arn: &str) -> Option<String> {
        self.state.lock().unwrap().web_acls.get(arn).cloned()
    }

    /// Record the call and pop any injected failure for it.
    fn enter(&self, operation: &str) -> CloudResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation.to_string());
        if let Some(queue) = state.fail_next.get_mut(operation) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CloudApi for InMemoryCloud {
    async fn create_load_balancer(
        &self,
        input: CreateLoadBalancerInput,
    ) -> CloudResult<LoadBalancerData> {
        self.enter("create_load_balancer")?;
        let seq = self.next_seq();
        let mut state = self.state.lock().unwrap();
        if state.load_balancers.values().any(|lb| lb.name == input.name) {
            return Err(CloudError::conflict(
                "DuplicateLoadBalancerName",
                format!("load balancer {} already exists", input.name),
            ));
        }
        let arn = format!(
            "arn:aws:elasticloadbalancing:us-east-1:000000000000:loadbalancer/app/{}/{seq:x}",
            input.name
        );
        let lb = LoadBalancerData {
            arn: arn.clone(),
            name: input.name.clone(),
            dns_name: format!("{}-{seq}.elb.example.com", input.name),
            scheme: input.scheme,
            subnet_ids: input.subnet_ids,
            security_group_ids: input.security_group_ids,
        };
        state.tags.insert(arn.clone(), input.tags);
        state.load_balancers.insert(arn, lb.clone());
        Ok(lb)
    }

    async fn describe_load_balancers(
        &self,
        _marker: Option<String>,
    ) -> CloudResult<Page<LoadBalancerData>> {
        self.enter("describe_load_balancers")?;
        let state = self.state.lock().unwrap();
        let mut items: Vec<_> = state.load_balancers.values().cloned().collect();
        items.sort_by(|a, b| a.arn.cmp(&b.arn));
        Ok(Page { items, next: None })
    }

    async fn describe_load_balancer_by_name(
        &self,
        name: &str,
    ) -> CloudResult<Option<LoadBalancerData>> {
        self.enter("describe_load_balancer_by_name")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .load_balancers
            .values()
            .find(|lb| lb.name == name)
            .cloned())
    }

    async fn set_subnets(&self, arn: &str, subnet_ids: Vec<String>) -> CloudResult<()> {
        self.enter("set_subnets")?;
        let mut state = self.state.lock().unwrap();
        match state.load_balancers.get_mut(arn) {
            Some(lb) => {
                lb.subnet_ids = subnet_ids;
                Ok(())
            }
            None => Err(CloudError::not_found(
                "LoadBalancerNotFound",
                format!("no load balancer {arn}"),
            )),
        }
    }

    async fn set_security_groups(&self, arn: &str, group_ids: Vec<String>) -> CloudResult<()> {
        self.enter("set_security_groups")?;
        let mut state = self.state.lock().unwrap();
        match state.load_balancers.get_mut(arn) {
            Some(lb) => {
                lb.security_group_ids = group_ids;
                Ok(())
            }
            None => Err(CloudError::not_found(
                "LoadBalancerNotFound",
                format!("no load balancer {arn}"),
            )),
        }
    }

    async fn delete_load_balancer(&self, arn: &str) -> CloudResult<()> {
        self.enter("delete_load_balancer")?;
        let mut state = self.state.lock().unwrap();
        if state.load_balancers.remove(arn).is_none() {
            return Err(CloudError::not_found(
                "LoadBalancerNotFound",
                format!("no load balancer {arn}"),
            ));
        }
        // Provider semantics: listeners and their rules go with the LB
        let orphaned: Vec<String> = state
            .listeners
            .iter()
            .filter(|(_, l)| l.load_balancer_arn == arn)
            .map(|(a, _)| a.clone())
            .collect();
        for listener_arn in orphaned {
            state.listeners.remove(&listener_arn);
            state
                .rules
                .retain(|_, r| r.listener_arn != listener_arn);
        }
        state.tags.remove(arn);
        state.web_acls.remove(arn);
        Ok(())
    }

    async fn create_listener(&self, input: CreateListenerInput) -> CloudResult<ListenerData> {
        self.enter("create_listener")?;
        let seq = self.next_seq();
        let mut state = self.state.lock().unwrap();
        if state
            .listeners
            .values()
            .any(|l| l.load_balancer_arn == input.load_balancer_arn && l.port == input.port)
        {
            return Err(CloudError::conflict(
                "DuplicateListener",
                format!("listener on port {} already exists", input.port),
            ));
        }
        let arn = format!("{}/listener/{seq:x}", input.load_balancer_arn);
        let listener = ListenerData {
            arn: arn.clone(),
            load_balancer_arn: input.load_balancer_arn,
            port: input.port,
            protocol: input.protocol,
            certificate_arn: input.certificate_arn,
            default_action: input.default_action,
        };
        state.listeners.insert(arn, listener.clone());
        Ok(listener)
    }

    async fn describe_listeners(&self, load_balancer_arn: &str) -> CloudResult<Vec<ListenerData>> {
        self.enter("describe_listeners")?;
        let state = self.state.lock().unwrap();
        let mut items: Vec<_> = state
            .listeners
            .values()
            .filter(|l| l.load_balancer_arn == load_balancer_arn)
            .cloned()
            .collect();
        items.sort_by_key(|l| l.port);
        Ok(items)
    }

    async fn modify_listener(
        &self,
        arn: &str,
        certificate_arn: Option<String>,
        default_action: ForwardAction,
    ) -> CloudResult<()> {
        self.enter("modify_listener")?;
        let mut state = self.state.lock().unwrap();
        match state.listeners.get_mut(arn) {
            Some(listener) => {
                listener.certificate_arn = certificate_arn;
                listener.default_action = default_action;
                Ok(())
            }
            None => Err(CloudError::not_found(
                "ListenerNotFound",
                format!("no listener {arn}"),
            )),
        }
    }

    async fn delete_listener(&self, arn: &str) -> CloudResult<()> {
        self.enter("delete_listener")?;
        let mut state = self.state.lock().unwrap();
        if state.listeners.remove(arn).is_none() {
            return Err(CloudError::not_found(
                "ListenerNotFound",
                format!("no listener {arn}"),
            ));
        }
        state.rules.retain(|_, r| r.listener_arn != arn);
        Ok(())
    }

    async fn create_rule(&self, input: CreateRuleInput) -> CloudResult<RuleData> {
        self.enter("create_rule")?;
        let seq = self.next_seq();
        let mut state = self.state.lock().unwrap();
        if !state.listeners.contains_key(&input.listener_arn) {
            return Err(CloudError::not_found(
                "ListenerNotFound",
                format!("no listener {}", input.listener_arn),
            ));
        }
        if state.rules.values().any(|r| {
            r.listener_arn == input.listener_arn && r.priority == RulePriority::At(input.priority)
        }) {
            return Err(CloudError::conflict(
                "PriorityInUse",
                format!("priority {} already in use", input.priority),
            ));
        }
        let arn = format!("{}/rule/{seq:x}", input.listener_arn);
        let rule = RuleData {
            arn: arn.clone(),
            listener_arn: input.listener_arn,
            priority: RulePriority::At(input.priority),
            conditions: input.conditions,
            action: input.action,
        };
        state.rules.insert(arn, rule.clone());
        Ok(rule)
    }

    async fn describe_rules(&self, listener_arn: &str) -> CloudResult<Vec<RuleData>> {
        self.enter("describe_rules")?;
        let state = self.state.lock().unwrap();
        let mut items: Vec<_> = state
            .rules
            .values()
            .filter(|r| r.listener_arn == listener_arn)
            .cloned()
            .collect();
        items.sort_by_key(|r| r.priority);
        Ok(items)
    }

    async fn modify_rule(
        &self,
        arn: &str,
        conditions: Vec<Condition>,
        action: ForwardAction,
    ) -> CloudResult<()> {
        self.enter("modify_rule")?;
        let mut state = self.state.lock().unwrap();
        match state.rules.get_mut(arn) {
            Some(rule) => {
                rule.conditions = conditions;
                rule.action = action;
                Ok(())
            }
            None => Err(CloudError::not_found(
                "RuleNotFound",
                format!("no rule {arn}"),
            )),
        }
    }

    async fn delete_rule(&self, arn: &str) -> CloudResult<()> {
        self.enter("delete_rule")?;
        let mut state = self.state.lock().unwrap();
        if state.rules.remove(arn).is_none() {
            return Err(CloudError::not_found(
                "RuleNotFound",
                format!("no rule {arn}"),
            ));
        }
        Ok(())
    }

    async fn set_rule_priorities(&self, priorities: Vec<(String, u32)>) -> CloudResult<()> {
        self.enter("set_rule_priorities")?;
        let mut state = self.state.lock().unwrap();
        for (arn, priority) in &priorities {
            match state.rules.get_mut(arn) {
                Some(rule) => rule.priority = RulePriority::At(*priority),
                None => {
                    return Err(CloudError::not_found(
                        "RuleNotFound",
                        format!("no rule {arn}"),
                    ))
                }
            }
        }
        Ok(())
    }

    async fn create_target_group(
        &self,
        input: CreateTargetGroupInput,
    ) -> CloudResult<TargetGroupData> {
        self.enter("create_target_group")?;
        let seq = self.next_seq();
        let mut state = self.state.lock().unwrap();
        if state.target_groups.values().any(|tg| tg.name == input.name) {
            return Err(CloudError::conflict(
                "DuplicateTargetGroupName",
                format!("target group {} already exists", input.name),
            ));
        }
        let arn = format!(
            "arn:aws:elasticloadbalancing:us-east-1:000000000000:targetgroup/{}/{seq:x}",
            input.name
        );
        let tg = TargetGroupData {
            arn: arn.clone(),
            name: input.name,
            port: input.port,
            protocol: input.protocol,
            target_type: input.target_type,
            vpc_id: input.vpc_id,
            health_check: input.health_check,
        };
        state.tags.insert(arn.clone(), input.tags);
        state.tg_attributes.insert(arn.clone(), input.attributes);
        state.target_groups.insert(arn, tg.clone());
        Ok(tg)
    }

    async fn describe_target_groups(
        &self,
        _marker: Option<String>,
    ) -> CloudResult<Page<TargetGroupData>> {
        self.enter("describe_target_groups")?;
        let state = self.state.lock().unwrap();
        let mut items: Vec<_> = state.target_groups.values().cloned().collect();
        items.sort_by(|a, b| a.arn.cmp(&b.arn));
        Ok(Page { items, next: None })
    }

    async fn describe_target_group_by_name(
        &self,
        name: &str,
    ) -> CloudResult<Option<TargetGroupData>> {
        self.enter("describe_target_group_by_name")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .target_groups
            .values()
            .find(|tg| tg.name == name)
            .cloned())
    }

    async fn modify_target_group(&self, arn: &str, health_check: HealthCheck) -> CloudResult<()> {
        self.enter("modify_target_group")?;
        let mut state = self.state.lock().unwrap();
        match state.target_groups.get_mut(arn) {
            Some(tg) => {
                tg.health_check = health_check;
                Ok(())
            }
            None => Err(CloudError::not_found(
                "TargetGroupNotFound",
                format!("no target group {arn}"),
            )),
        }
    }

    async fn describe_target_group_attributes(
        &self,
        arn: &str,
    ) -> CloudResult<BTreeMap<String, String>> {
        self.enter("describe_target_group_attributes")?;
        let state = self.state.lock().unwrap();
        Ok(state.tg_attributes.get(arn).cloned().unwrap_or_default())
    }

    async fn modify_target_group_attributes(
        &self,
        arn: &str,
        attributes: BTreeMap<String, String>,
    ) -> CloudResult<()> {
        self.enter("modify_target_group_attributes")?;
        let mut state = self.state.lock().unwrap();
        state
            .tg_attributes
            .entry(arn.to_string())
            .or_default()
            .extend(attributes);
        Ok(())
    }

    async fn delete_target_group(&self, arn: &str) -> CloudResult<()> {
        self.enter("delete_target_group")?;
        let mut state = self.state.lock().unwrap();
        if state.target_groups.remove(arn).is_none() {
            return Err(CloudError::not_found(
                "TargetGroupNotFound",
                format!("no target group {arn}"),
            ));
        }
        state.registrations.remove(arn);
        state.tg_attributes.remove(arn);
        state.tags.remove(arn);
        Ok(())
    }

    async fn register_targets(
        &self,
        target_group_arn: &str,
        targets: Vec<TargetDescription>,
    ) -> CloudResult<()> {
        self.enter("register_targets")?;
        let mut state = self.state.lock().unwrap();
        if !state.target_groups.contains_key(target_group_arn) {
            return Err(CloudError::not_found(
                "TargetGroupNotFound",
                format!("no target group {target_group_arn}"),
            ));
        }
        let regs = state
            .registrations
            .entry(target_group_arn.to_string())
            .or_default();
        for target in targets {
            if !regs.iter().any(|th| th.target == target) {
                regs.push(TargetHealth {
                    target,
                    state: TargetHealthState::Healthy,
                });
            }
        }
        Ok(())
    }

    async fn deregister_targets(
        &self,
        target_group_arn: &str,
        targets: Vec<TargetDescription>,
    ) -> CloudResult<()> {
        self.enter("deregister_targets")?;
        let mut state = self.state.lock().unwrap();
        if let Some(regs) = state.registrations.get_mut(target_group_arn) {
            regs.retain(|th| !targets.contains(&th.target));
        }
        Ok(())
    }

    async fn describe_target_health(
        &self,
        target_group_arn: &str,
    ) -> CloudResult<Vec<TargetHealth>> {
        self.enter("describe_target_health")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .registrations
            .get(target_group_arn)
            .cloned()
            .unwrap_or_default())
    }

    async fn describe_tags(&self, resource_arn: &str) -> CloudResult<BTreeMap<String, String>> {
        self.enter("describe_tags")?;
        let state = self.state.lock().unwrap();
        Ok(state.tags.get(resource_arn).cloned().unwrap_or_default())
    }

    async fn add_tags(
        &self,
        resource_arn: &str,
        tags: BTreeMap<String, String>,
    ) -> CloudResult<()> {
        self.enter("add_tags")?;
        let mut state = self.state.lock().unwrap();
        state
            .tags
            .entry(resource_arn.to_string())
            .or_default()
            .extend(tags);
        Ok(())
    }

    async fn remove_tags(&self, resource_arn: &str, keys: Vec<String>) -> CloudResult<()> {
        self.enter("remove_tags")?;
        let mut state = self.state.lock().unwrap();
        if let Some(tags) = state.tags.get_mut(resource_arn) {
            for key in keys {
                tags.remove(&key);
            }
        }
        Ok(())
    }

    async fn create_security_group(
        &self,
        input: CreateSecurityGroupInput,
    ) -> CloudResult<SecurityGroupData> {
        self.enter("create_security_group")?;
        let seq = self.next_seq();
        let mut state = self.state.lock().unwrap();
        if state.security_groups.values().any(|sg| sg.name == input.name) {
            return Err(CloudError::conflict(
                "InvalidGroup.Duplicate",
                format!("security group {} already exists", input.name),
            ));
        }
        let id = format!("sg-{seq:017x}");
        let sg = SecurityGroupData {
            id: id.clone(),
            name: input.name,
            description: input.description,
            inbound: Vec::new(),
            tags: input.tags.clone(),
        };
        state.tags.insert(id.clone(), input.tags);
        state.security_groups.insert(id, sg.clone());
        Ok(sg)
    }

    async fn describe_security_group(&self, id: &str) -> CloudResult<Option<SecurityGroupData>> {
        self.enter("describe_security_group")?;
        let state = self.state.lock().unwrap();
        Ok(state.security_groups.get(id).cloned())
    }

    async fn describe_security_groups_by_name_tags(
        &self,
        names: &[String],
    ) -> CloudResult<Vec<SecurityGroupData>> {
        self.enter("describe_security_groups_by_name_tags")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .security_groups
            .values()
            .filter(|sg| {
                sg.tags
                    .get(crate::labels::TAG_NAME)
                    .is_some_and(|name| names.contains(name))
            })
            .cloned()
            .collect())
    }

    async fn authorize_ingress(
        &self,
        group_id: &str,
        permissions: Vec<IpPermission>,
    ) -> CloudResult<()> {
        self.enter("authorize_ingress")?;
        let mut state = self.state.lock().unwrap();
        match state.security_groups.get_mut(group_id) {
            Some(sg) => {
                sg.inbound.extend(permissions);
                Ok(())
            }
            None => Err(CloudError::not_found(
                "InvalidGroup.NotFound",
                format!("no security group {group_id}"),
            )),
        }
    }

    async fn revoke_ingress(
        &self,
        group_id: &str,
        permissions: Vec<IpPermission>,
    ) -> CloudResult<()> {
        self.enter("revoke_ingress")?;
        let mut state = self.state.lock().unwrap();
        match state.security_groups.get_mut(group_id) {
            Some(sg) => {
                sg.inbound.retain(|p| !permissions.contains(p));
                Ok(())
            }
            None => Err(CloudError::not_found(
                "InvalidGroup.NotFound",
                format!("no security group {group_id}"),
            )),
        }
    }

    async fn delete_security_group(&self, id: &str) -> CloudResult<()> {
        self.enter("delete_security_group")?;
        let mut state = self.state.lock().unwrap();
        if state.security_groups.remove(id).is_none() {
            return Err(CloudError::not_found(
                "InvalidGroup.NotFound",
                format!("no security group {id}"),
            ));
        }
        state.tags.remove(id);
        Ok(())
    }

    async fn describe_subnets_by_ids(&self, ids: &[String]) -> CloudResult<Vec<SubnetData>> {
        self.enter("describe_subnets_by_ids")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .subnets
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn describe_subnets_by_name_tags(
        &self,
        names: &[String],
    ) -> CloudResult<Vec<SubnetData>> {
        self.enter("describe_subnets_by_name_tags")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .subnets
            .iter()
            .filter(|s| s.name_tag.as_ref().is_some_and(|n| names.contains(n)))
            .cloned()
            .collect())
    }

    async fn get_web_acl_for_resource(&self, resource_arn: &str) -> CloudResult<Option<String>> {
        self.enter("get_web_acl_for_resource")?;
        let state = self.state.lock().unwrap();
        Ok(state.web_acls.get(resource_arn).cloned())
    }

    async fn associate_web_acl(&self, resource_arn: &str, web_acl_id: &str) -> CloudResult<()> {
        self.enter("associate_web_acl")?;
        let mut state = self.state.lock().unwrap();
        state
            .web_acls
            .insert(resource_arn.to_string(), web_acl_id.to_string());
        Ok(())
    }

    async fn disassociate_web_acl(&self, resource_arn: &str) -> CloudResult<()> {
        self.enter("disassociate_web_acl")?;
        let mut state = self.state.lock().unwrap();
        state.web_acls.remove(resource_arn);
        Ok(())
    }
}
