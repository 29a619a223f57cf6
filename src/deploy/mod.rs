// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Stack deployer.
//!
//! Executes an [`ActionPlan`] against the cloud in two passes with a fixed
//! class ordering:
//!
//! - deletions first, in reverse creation order (binding, rule, listener,
//!   load balancer, target group, permission revoke, security group),
//! - then creations and modifications in creation order (security group,
//!   permission grant, target group, load balancer, listener, rule,
//!   binding).
//!
//! Within a class, actions run in parallel; a class barrier ensures all
//! prior-class actions have committed before the next class begins. After
//! each create, the newly-assigned cloud identifier is written into the
//! [`ResolutionTable`] so downstream specs can substitute references for
//! concrete values. On any failure the remaining classes are abandoned;
//! committed actions stand, and the next reconcile observes the partial
//! state through the assembler and converges.
//!
//! Every action is idempotent: creates adopt on name conflicts when the
//! existing resource carries this controller's tags, and deletes treat
//! not-found as success.

pub mod targets;

use crate::aws::types::{
    CreateListenerInput, CreateLoadBalancerInput, CreateRuleInput, CreateSecurityGroupInput,
    CreateTargetGroupInput, ForwardAction, RulePriority,
};
use crate::aws::{Cloud, CloudResult};
use crate::constants::RULE_PRIORITY_PROVISIONAL_BASE;
use crate::diff::{Action, ActionPlan, ListenerRuleActions, TagChanges};
use crate::errors::{CloudErrorKind, ReconcileError};
use crate::labels::TAG_MANAGED_BY;
use crate::metrics;
use crate::model::{
    Attribute, ListenerRuleSpec, ListenerSpec, LoadBalancerSpec, LogicalId, Reference, Resource,
    RuleTarget, SecurityGroupAttachment, SecurityGroupSpec, Stack, TargetGroupBindingSpec,
    TargetGroupSpec,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Mutex;
use targets::TargetResolver;
use tracing::{debug, info};

/// Lazily-resolved cloud attributes of deployed specs.
///
/// Seeded from the diff's pairings; every create inserts its result.
/// Resolving a reference that was never committed is a programming error;
/// the class ordering guarantees it cannot happen in a consistent plan.
#[derive(Debug, Default)]
pub struct ResolutionTable {
    values: Mutex<HashMap<(LogicalId, Attribute), String>>,
}

impl ResolutionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload pairings discovered by the assembler.
    pub fn seed(&self, pairings: &[(LogicalId, Attribute, String)]) {
        let mut values = self.values.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (id, attribute, value) in pairings {
            values.insert((id.clone(), *attribute), value.clone());
        }
    }

    /// Record a committed attribute.
    pub fn insert(&self, id: LogicalId, attribute: Attribute, value: String) {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((id, attribute), value);
    }

    /// Resolve a reference to its committed cloud value.
    ///
    /// # Errors
    ///
    /// An [`ReconcileError::Invariant`] when the referent has not
    /// committed, which indicates a plan-ordering bug.
    pub fn resolve(&self, reference: &Reference) -> Result<String, ReconcileError> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(reference.target.clone(), reference.attribute))
            .cloned()
            .ok_or_else(|| {
                ReconcileError::invariant(format!(
                    "unresolved reference to {} ({:?}) at deploy time",
                    reference.target, reference.attribute
                ))
            })
    }

    /// Resolve when present, without treating absence as a bug.
    #[must_use]
    pub fn try_resolve(&self, reference: &Reference) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(reference.target.clone(), reference.attribute))
            .cloned()
    }
}

/// Treat not-found as success for delete idempotence.
fn ignore_not_found(result: CloudResult<()>) -> CloudResult<()> {
    match result {
        Err(err) if err.kind == CloudErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Collect the first error after letting every action in a class finish.
fn first_error(results: Vec<Result<(), ReconcileError>>) -> Result<(), ReconcileError> {
    for result in results {
        result?;
    }
    Ok(())
}

/// Executes action plans with dependency-ordered classes.
pub struct StackDeployer<'a> {
    cloud: &'a Cloud,
    targets: &'a dyn TargetResolver,
}

impl<'a> StackDeployer<'a> {
    #[must_use]
    pub fn new(cloud: &'a Cloud, targets: &'a dyn TargetResolver) -> Self {
        Self { cloud, targets }
    }

    /// Execute the plan.
    ///
    /// Returns the resolution table so callers can read output attributes
    /// (the load balancer DNS name in particular).
    ///
    /// # Errors
    ///
    /// The first action failure aborts all later classes and propagates.
    pub async fn deploy(
        &self,
        stack: &Stack,
        plan: &ActionPlan,
    ) -> Result<ResolutionTable, ReconcileError> {
        let table = ResolutionTable::new();
        table.seed(&plan.pairings);

        // Deletion pass, reverse creation order
        self.delete_listener_rules(plan).await?;
        self.delete_listeners(plan).await?;
        self.delete_load_balancers(plan).await?;
        self.delete_target_groups(plan).await?;
        self.revoke_permissions(stack, plan, &table).await?;
        self.delete_security_groups(plan).await?;

        // Creation pass, creation order
        self.apply_security_groups(stack, plan, &table).await?;
        self.grant_permissions(stack, plan, &table).await?;
        self.apply_target_groups(stack, plan, &table).await?;
        self.apply_load_balancers(stack, plan, &table).await?;
        self.apply_listeners(stack, plan, &table).await?;
        self.apply_listener_rules(stack, plan, &table).await?;
        self.reconcile_bindings(stack, plan, &table).await?;

        Ok(table)
    }

    // ------------------------------------------------------------------
    // Deletion pass
    // ------------------------------------------------------------------

    async fn delete_listener_rules(&self, plan: &ActionPlan) -> Result<(), ReconcileError> {
        let futures: Vec<_> = plan
            .listener_rules
            .iter()
            .flat_map(|batch| batch.deletes.iter())
            .map(|arn| async move {
                metrics::record_deploy_action("ListenerRule", "delete");
                ignore_not_found(self.cloud.delete_rule(arn).await)?;
                Ok(())
            })
            .collect();
        first_error(join_all(futures).await)
    }

    async fn delete_listeners(&self, plan: &ActionPlan) -> Result<(), ReconcileError> {
        let futures: Vec<_> = plan
            .listeners
            .iter()
            .filter_map(|action| match action {
                Action::Delete { cloud_id } => Some(cloud_id),
                _ => None,
            })
            .map(|arn| async move {
                info!(listener = %arn, "deleting listener");
                metrics::record_deploy_action("Listener", "delete");
                ignore_not_found(self.cloud.delete_listener(arn).await)?;
                Ok(())
            })
            .collect();
        first_error(join_all(futures).await)
    }

    async fn delete_load_balancers(&self, plan: &ActionPlan) -> Result<(), ReconcileError> {
        for action in &plan.load_balancers {
            let arn = match action {
                Action::Delete { cloud_id } | Action::Replace { cloud_id, .. } => cloud_id,
                _ => continue,
            };
            info!(load_balancer = %arn, "deleting load balancer");
            metrics::record_deploy_action("LoadBalancer", "delete");
            ignore_not_found(self.cloud.delete_load_balancer(arn).await)?;
        }
        Ok(())
    }

    async fn delete_target_groups(&self, plan: &ActionPlan) -> Result<(), ReconcileError> {
        let futures: Vec<_> = plan
            .target_groups
            .iter()
            .filter_map(|action| match action {
                Action::Delete { cloud_id } | Action::Replace { cloud_id, .. } => Some(cloud_id),
                _ => None,
            })
            .map(|arn| async move {
                info!(target_group = %arn, "deleting target group");
                metrics::record_deploy_action("TargetGroup", "delete");
                ignore_not_found(self.cloud.delete_target_group(arn).await)?;
                Ok(())
            })
            .collect();
        first_error(join_all(futures).await)
    }

    async fn revoke_permissions(
        &self,
        stack: &Stack,
        plan: &ActionPlan,
        table: &ResolutionTable,
    ) -> Result<(), ReconcileError> {
        if plan.permission_revokes.is_empty() {
            return Ok(());
        }
        let sg_id = self.managed_security_group_id(stack, table)?;
        metrics::record_deploy_action("SecurityGroupRule", "revoke");
        self.cloud
            .revoke_ingress(&sg_id, plan.permission_revokes.clone())
            .await?;
        Ok(())
    }

    async fn delete_security_groups(&self, plan: &ActionPlan) -> Result<(), ReconcileError> {
        for action in &plan.security_groups {
            let Action::Delete { cloud_id } = action else {
                continue;
            };
            info!(security_group = %cloud_id, "deleting security group");
            metrics::record_deploy_action("SecurityGroup", "delete");
            ignore_not_found(self.cloud.delete_security_group(cloud_id).await)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Creation pass
    // ------------------------------------------------------------------

    async fn apply_security_groups(
        &self,
        stack: &Stack,
        plan: &ActionPlan,
        table: &ResolutionTable,
    ) -> Result<(), ReconcileError> {
        for action in &plan.security_groups {
            match action {
                Action::Create { id } => {
                    let spec = self.security_group_spec(stack, id)?;
                    metrics::record_deploy_action("SecurityGroup", "create");
                    let group_id = self.create_or_adopt_security_group(spec).await?;
                    info!(security_group = %group_id, "security group ready");
                    table.insert(id.clone(), Attribute::GroupId, group_id);
                }
                Action::Modify {
                    cloud_id, changes, ..
                } => {
                    metrics::record_deploy_action("SecurityGroup", "modify");
                    self.apply_tags(cloud_id, changes).await?;
                }
                Action::Replace { .. } | Action::Delete { .. } => {}
            }
        }
        Ok(())
    }

    async fn create_or_adopt_security_group(
        &self,
        spec: &SecurityGroupSpec,
    ) -> Result<String, ReconcileError> {
        let input = CreateSecurityGroupInput {
            name: spec.name.clone(),
            description: spec.description.clone(),
            vpc_id: spec.vpc_id.clone(),
            tags: spec.tags.clone(),
        };
        match self.cloud.create_security_group(input).await {
            Ok(sg) => Ok(sg.id),
            Err(err) if Cloud::is_adoptable_conflict(&err) => {
                // A previous reconcile created it; adopt by Name tag
                let name_tag = spec
                    .tags
                    .get(crate::labels::TAG_NAME)
                    .cloned()
                    .unwrap_or_default();
                let existing = self
                    .cloud
                    .describe_security_groups_by_name_tags(std::slice::from_ref(&name_tag))
                    .await?;
                existing
                    .into_iter()
                    .find(|sg| sg.tags.get(TAG_MANAGED_BY) == spec.tags.get(TAG_MANAGED_BY))
                    .map(|sg| {
                        debug!(security_group = %sg.id, "adopted existing security group");
                        sg.id
                    })
                    .ok_or_else(|| err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn grant_permissions(
        &self,
        stack: &Stack,
        plan: &ActionPlan,
        table: &ResolutionTable,
    ) -> Result<(), ReconcileError> {
        if plan.permission_grants.is_empty() {
            return Ok(());
        }
        let sg_id = self.managed_security_group_id(stack, table)?;
        metrics::record_deploy_action("SecurityGroupRule", "grant");
        // A prior partial run may have granted some of these already;
        // duplicate grants surface as a conflict we can ignore
        match self
            .cloud
            .authorize_ingress(&sg_id, plan.permission_grants.clone())
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if err.kind == CloudErrorKind::Conflict => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn apply_target_groups(
        &self,
        stack: &Stack,
        plan: &ActionPlan,
        table: &ResolutionTable,
    ) -> Result<(), ReconcileError> {
        let futures: Vec<_> = plan
            .target_groups
            .iter()
            .map(|action| async move {
                match action {
                    Action::Create { id } | Action::Replace { id, .. } => {
                        let spec = self.target_group_spec(stack, id)?;
                        metrics::record_deploy_action("TargetGroup", "create");
                        let arn = self.create_or_adopt_target_group(spec).await?;
                        info!(target_group = %arn, name = %spec.name, "target group ready");
                        table.insert(id.clone(), Attribute::Arn, arn);
                        Ok(())
                    }
                    Action::Modify {
                        cloud_id, changes, ..
                    } => {
                        metrics::record_deploy_action("TargetGroup", "modify");
                        if let Some(health_check) = &changes.health_check {
                            self.cloud
                                .modify_target_group(cloud_id, health_check.clone())
                                .await?;
                        }
                        if !changes.attributes.is_empty() {
                            self.cloud
                                .modify_target_group_attributes(cloud_id, changes.attributes.clone())
                                .await?;
                        }
                        self.apply_tags(cloud_id, &changes.tags).await?;
                        Ok(())
                    }
                    Action::Delete { .. } => Ok(()),
                }
            })
            .collect();
        first_error(join_all(futures).await)
    }

    async fn create_or_adopt_target_group(
        &self,
        spec: &TargetGroupSpec,
    ) -> Result<String, ReconcileError> {
        let input = CreateTargetGroupInput {
            name: spec.name.clone(),
            port: spec.port,
            protocol: spec.protocol,
            target_type: spec.target_type,
            vpc_id: spec.vpc_id.clone(),
            health_check: spec.health_check.clone(),
            attributes: spec.attributes.clone(),
            tags: spec.tags.clone(),
        };
        match self.cloud.create_target_group(input).await {
            Ok(tg) => Ok(tg.arn),
            Err(err) if Cloud::is_adoptable_conflict(&err) => {
                let existing = self.cloud.describe_target_group_by_name(&spec.name).await?;
                match existing {
                    Some(tg) => {
                        let tags = self.cloud.describe_tags(&tg.arn).await?;
                        if tags.get(TAG_MANAGED_BY) != spec.tags.get(TAG_MANAGED_BY) {
                            return Err(err.into());
                        }
                        debug!(target_group = %tg.arn, "adopted existing target group");
                        // Converge the adopted group to the desired spec
                        self.cloud
                            .modify_target_group(&tg.arn, spec.health_check.clone())
                            .await?;
                        Ok(tg.arn)
                    }
                    None => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn apply_load_balancers(
        &self,
        stack: &Stack,
        plan: &ActionPlan,
        table: &ResolutionTable,
    ) -> Result<(), ReconcileError> {
        for action in &plan.load_balancers {
            match action {
                Action::Create { id } | Action::Replace { id, .. } => {
                    let spec = self.load_balancer_spec(stack, id)?;
                    metrics::record_deploy_action("LoadBalancer", "create");
                    let lb = self.create_or_adopt_load_balancer(spec, table).await?;
                    info!(load_balancer = %lb.0, dns_name = %lb.1, "load balancer ready");
                    table.insert(id.clone(), Attribute::Arn, lb.0.clone());
                    table.insert(id.clone(), Attribute::DnsName, lb.1);
                    if let Some(acl) = &spec.wafacl_id {
                        self.cloud.associate_web_acl(&lb.0, acl).await?;
                    }
                }
                Action::Modify {
                    cloud_id, changes, ..
                } => {
                    metrics::record_deploy_action("LoadBalancer", "modify");
                    if let Some(subnets) = &changes.subnet_ids {
                        self.cloud.set_subnets(cloud_id, subnets.clone()).await?;
                    }
                    if let Some(attachments) = &changes.security_groups {
                        let ids = self.resolve_attachments(attachments, table)?;
                        self.cloud.set_security_groups(cloud_id, ids).await?;
                    }
                    self.apply_tags(cloud_id, &changes.tags).await?;
                    match &changes.wafacl {
                        Some(Some(acl)) => self.cloud.associate_web_acl(cloud_id, acl).await?,
                        Some(None) => self.cloud.disassociate_web_acl(cloud_id).await?,
                        None => {}
                    }
                }
                Action::Delete { .. } => {}
            }
        }
        Ok(())
    }

    async fn create_or_adopt_load_balancer(
        &self,
        spec: &LoadBalancerSpec,
        table: &ResolutionTable,
    ) -> Result<(String, String), ReconcileError> {
        let security_group_ids = self.resolve_attachments(&spec.security_groups, table)?;
        let input = CreateLoadBalancerInput {
            name: spec.name.clone(),
            scheme: spec.scheme,
            subnet_ids: spec.subnet_ids.clone(),
            security_group_ids: security_group_ids.clone(),
            tags: spec.tags.clone(),
        };
        match self.cloud.create_load_balancer(input).await {
            Ok(lb) => Ok((lb.arn, lb.dns_name)),
            Err(err) if Cloud::is_adoptable_conflict(&err) => {
                let existing = self
                    .cloud
                    .describe_load_balancer_by_name(&spec.name)
                    .await?;
                match existing {
                    Some(lb) => {
                        let tags = self.cloud.describe_tags(&lb.arn).await?;
                        if tags.get(TAG_MANAGED_BY) != spec.tags.get(TAG_MANAGED_BY) {
                            // Same name, not ours: never adopt foreign resources
                            return Err(err.into());
                        }
                        debug!(load_balancer = %lb.arn, "adopted existing load balancer");
                        self.cloud
                            .set_subnets(&lb.arn, spec.subnet_ids.clone())
                            .await?;
                        self.cloud
                            .set_security_groups(&lb.arn, security_group_ids)
                            .await?;
                        Ok((lb.arn, lb.dns_name))
                    }
                    None => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn apply_listeners(
        &self,
        stack: &Stack,
        plan: &ActionPlan,
        table: &ResolutionTable,
    ) -> Result<(), ReconcileError> {
        let futures: Vec<_> = plan
            .listeners
            .iter()
            .map(|action| async move {
                match action {
                    Action::Create { id } => {
                        let spec = self.listener_spec(stack, id)?;
                        let default_action =
                            self.default_action_of_listener(stack, id, table)?;
                        metrics::record_deploy_action("Listener", "create");
                        let arn = self
                            .create_or_adopt_listener(spec, default_action, table)
                            .await?;
                        info!(listener = %arn, port = spec.port, "listener ready");
                        table.insert(id.clone(), Attribute::Arn, arn);
                        Ok(())
                    }
                    Action::Modify { id, cloud_id, .. } => {
                        // Level-triggered: always write the full desired
                        // certificate and fallback action
                        let spec = self.listener_spec(stack, id)?;
                        let default_action =
                            self.default_action_of_listener(stack, id, table)?;
                        metrics::record_deploy_action("Listener", "modify");
                        self.cloud
                            .modify_listener(
                                cloud_id,
                                spec.certificate_arn.clone(),
                                default_action,
                            )
                            .await?;
                        Ok(())
                    }
                    Action::Replace { .. } | Action::Delete { .. } => Ok(()),
                }
            })
            .collect();
        first_error(join_all(futures).await)
    }

    async fn create_or_adopt_listener(
        &self,
        spec: &ListenerSpec,
        default_action: ForwardAction,
        table: &ResolutionTable,
    ) -> Result<String, ReconcileError> {
        let lb_arn = table.resolve(&spec.load_balancer)?;
        let input = CreateListenerInput {
            load_balancer_arn: lb_arn.clone(),
            port: spec.port,
            protocol: spec.protocol,
            certificate_arn: spec.certificate_arn.clone(),
            default_action: default_action.clone(),
        };
        match self.cloud.create_listener(input).await {
            Ok(listener) => Ok(listener.arn),
            Err(err) if Cloud::is_adoptable_conflict(&err) => {
                let existing = self.cloud.describe_listeners(&lb_arn).await?;
                match existing.into_iter().find(|l| l.port == spec.port) {
                    Some(listener) => {
                        debug!(listener = %listener.arn, "adopted existing listener");
                        self.cloud
                            .modify_listener(
                                &listener.arn,
                                spec.certificate_arn.clone(),
                                default_action,
                            )
                            .await?;
                        Ok(listener.arn)
                    }
                    None => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn apply_listener_rules(
        &self,
        stack: &Stack,
        plan: &ActionPlan,
        table: &ResolutionTable,
    ) -> Result<(), ReconcileError> {
        let futures: Vec<_> = plan
            .listener_rules
            .iter()
            .map(|batch| self.apply_rule_batch(stack, batch, table))
            .collect();
        first_error(join_all(futures).await)
    }

    /// Apply one listener's rule operations, finishing with a single
    /// priority-reassignment batch so a half-written listener never holds
    /// two rules at the same final priority.
    async fn apply_rule_batch(
        &self,
        stack: &Stack,
        batch: &ListenerRuleActions,
        table: &ResolutionTable,
    ) -> Result<(), ReconcileError> {
        for (_, arn, changes) in &batch.modifies {
            metrics::record_deploy_action("ListenerRule", "modify");
            let action = self.forward_action(&changes.target, table)?;
            self.cloud
                .modify_rule(arn, changes.conditions.clone(), action)
                .await?;
        }

        if batch.creates.is_empty() {
            return Ok(());
        }

        let listener_arn = table.resolve(&Reference::arn(batch.listener.clone()))?;
        let mut final_priorities = Vec::new();

        for (offset, rule_id) in batch.creates.iter().enumerate() {
            let spec = self.rule_spec(stack, rule_id)?;
            let RulePriority::At(final_priority) = spec.priority else {
                continue;
            };
            let provisional = RULE_PRIORITY_PROVISIONAL_BASE
                + u32::try_from(offset).unwrap_or(u32::MAX);
            metrics::record_deploy_action("ListenerRule", "create");
            let action = self.forward_action(&spec.target, table)?;
            let rule = self
                .cloud
                .create_rule(CreateRuleInput {
                    listener_arn: listener_arn.clone(),
                    priority: provisional,
                    conditions: spec.conditions.clone(),
                    action,
                })
                .await?;
            final_priorities.push((rule.arn, final_priority));
        }

        if !final_priorities.is_empty() {
            self.cloud.set_rule_priorities(final_priorities).await?;
        }
        Ok(())
    }

    async fn reconcile_bindings(
        &self,
        stack: &Stack,
        plan: &ActionPlan,
        table: &ResolutionTable,
    ) -> Result<(), ReconcileError> {
        let futures: Vec<_> = plan
            .bindings
            .iter()
            .map(|id| async move {
                let spec = self.binding_spec(stack, id)?;
                self.reconcile_binding(spec, table).await
            })
            .collect();
        first_error(join_all(futures).await)
    }

    async fn reconcile_binding(
        &self,
        spec: &TargetGroupBindingSpec,
        table: &ResolutionTable,
    ) -> Result<(), ReconcileError> {
        let tg_arn = table.resolve(&spec.target_group)?;
        let desired = self
            .targets
            .resolve_targets(&spec.service, spec.target_type)
            .await?;
        let current = self.cloud.describe_target_health(&tg_arn).await?;
        let reconcile = crate::diff::diff_targets(&desired, &current);

        if reconcile.is_empty() {
            return Ok(());
        }
        debug!(
            target_group = %tg_arn,
            service = %spec.service,
            register = reconcile.register.len(),
            deregister = reconcile.deregister.len(),
            "reconciling target registrations"
        );
        if !reconcile.register.is_empty() {
            metrics::record_deploy_action("TargetGroupBinding", "register");
            self.cloud
                .register_targets(&tg_arn, reconcile.register)
                .await?;
        }
        if !reconcile.deregister.is_empty() {
            metrics::record_deploy_action("TargetGroupBinding", "deregister");
            self.cloud
                .deregister_targets(&tg_arn, reconcile.deregister)
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    async fn apply_tags(&self, arn: &str, changes: &TagChanges) -> Result<(), ReconcileError> {
        if !changes.set.is_empty() {
            self.cloud.add_tags(arn, changes.set.clone()).await?;
        }
        if !changes.remove.is_empty() {
            self.cloud.remove_tags(arn, changes.remove.clone()).await?;
        }
        Ok(())
    }

    fn resolve_attachments(
        &self,
        attachments: &[SecurityGroupAttachment],
        table: &ResolutionTable,
    ) -> Result<Vec<String>, ReconcileError> {
        attachments
            .iter()
            .map(|attachment| match attachment {
                SecurityGroupAttachment::Id(id) => Ok(id.clone()),
                SecurityGroupAttachment::Managed(reference) => table.resolve(reference),
            })
            .collect()
    }

    fn forward_action(
        &self,
        target: &RuleTarget,
        table: &ResolutionTable,
    ) -> Result<ForwardAction, ReconcileError> {
        match target {
            RuleTarget::TargetGroup(reference) => Ok(ForwardAction::Forward {
                target_group_arn: table.resolve(reference)?,
            }),
            RuleTarget::FixedNotFound => Ok(ForwardAction::FixedResponse { status_code: 404 }),
        }
    }

    fn default_action_of_listener(
        &self,
        stack: &Stack,
        listener_id: &LogicalId,
        table: &ResolutionTable,
    ) -> Result<ForwardAction, ReconcileError> {
        let target = stack
            .rules_of_listener(listener_id)
            .into_iter()
            .find(|(_, r)| r.priority == RulePriority::Default)
            .map(|(_, r)| r.target.clone())
            .ok_or_else(|| {
                ReconcileError::invariant(format!("listener {listener_id} has no default rule"))
            })?;
        self.forward_action(&target, table)
    }

    fn managed_security_group_id(
        &self,
        stack: &Stack,
        table: &ResolutionTable,
    ) -> Result<String, ReconcileError> {
        let (id, _) = stack
            .of_kind(crate::model::ResourceKind::SecurityGroup)
            .next()
            .ok_or_else(|| {
                ReconcileError::invariant(
                    "permission changes planned but the stack has no managed security group",
                )
            })?;
        table.resolve(&Reference::group_id(id.clone()))
    }

    fn load_balancer_spec<'s>(
        &self,
        stack: &'s Stack,
        id: &LogicalId,
    ) -> Result<&'s LoadBalancerSpec, ReconcileError> {
        match stack.get(id) {
            Some(Resource::LoadBalancer(spec)) => Ok(spec),
            _ => Err(ReconcileError::invariant(format!(
                "plan references missing load balancer spec {id}"
            ))),
        }
    }

    fn listener_spec<'s>(
        &self,
        stack: &'s Stack,
        id: &LogicalId,
    ) -> Result<&'s ListenerSpec, ReconcileError> {
        match stack.get(id) {
            Some(Resource::Listener(spec)) => Ok(spec),
            _ => Err(ReconcileError::invariant(format!(
                "plan references missing listener spec {id}"
            ))),
        }
    }

    fn rule_spec<'s>(
        &self,
        stack: &'s Stack,
        id: &LogicalId,
    ) -> Result<&'s ListenerRuleSpec, ReconcileError> {
        match stack.get(id) {
            Some(Resource::ListenerRule(spec)) => Ok(spec),
            _ => Err(ReconcileError::invariant(format!(
                "plan references missing rule spec {id}"
            ))),
        }
    }

    fn target_group_spec<'s>(
        &self,
        stack: &'s Stack,
        id: &LogicalId,
    ) -> Result<&'s TargetGroupSpec, ReconcileError> {
        match stack.get(id) {
            Some(Resource::TargetGroup(spec)) => Ok(spec),
            _ => Err(ReconcileError::invariant(format!(
                "plan references missing target group spec {id}"
            ))),
        }
    }

    fn binding_spec<'s>(
        &self,
        stack: &'s Stack,
        id: &LogicalId,
    ) -> Result<&'s TargetGroupBindingSpec, ReconcileError> {
        match stack.get(id) {
            Some(Resource::TargetGroupBinding(spec)) => Ok(spec),
            _ => Err(ReconcileError::invariant(format!(
                "plan references missing binding spec {id}"
            ))),
        }
    }

    fn security_group_spec<'s>(
        &self,
        stack: &'s Stack,
        id: &LogicalId,
    ) -> Result<&'s SecurityGroupSpec, ReconcileError> {
        match stack.get(id) {
            Some(Resource::SecurityGroup(spec)) => Ok(spec),
            _ => Err(ReconcileError::invariant(format!(
                "plan references missing security group spec {id}"
            ))),
        }
    }
}
