// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The cloud API seam.
//!
//! [`CloudApi`] captures every cloud call the controller makes, in one
//! trait, mirroring the shape of the provider's load-balancer, compute,
//! firewall, and tagging services. The production implementation wraps the
//! SDK transport (out of scope for this crate); tests use
//! [`crate::aws::fake::InMemoryCloud`].
//!
//! Implementations must be thread-safe by contract; the facade layers
//! retry, pagination, and metrics on top and never assumes more than that.

use crate::aws::types::{
    CreateListenerInput, CreateLoadBalancerInput, CreateRuleInput, CreateSecurityGroupInput,
    CreateTargetGroupInput, ForwardAction, HealthCheck, IpPermission, ListenerData,
    LoadBalancerData, Page, RuleData, SecurityGroupData, SubnetData, TargetDescription,
    TargetGroupData, TargetHealth, Condition,
};
use crate::errors::CloudError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Result alias for raw cloud calls.
pub type CloudResult<T> = Result<T, CloudError>;

/// Typed interface over the cloud's load-balancer, compute, firewall, and
/// tag APIs.
#[async_trait]
pub trait CloudApi: Send + Sync {
    // ------------------------------------------------------------------
    // Load balancers
    // ------------------------------------------------------------------

    async fn create_load_balancer(
        &self,
        input: CreateLoadBalancerInput,
    ) -> CloudResult<LoadBalancerData>;

    async fn describe_load_balancers(
        &self,
        marker: Option<String>,
    ) -> CloudResult<Page<LoadBalancerData>>;

    /// Look up a load balancer by its unique name; `None` when absent.
    async fn describe_load_balancer_by_name(
        &self,
        name: &str,
    ) -> CloudResult<Option<LoadBalancerData>>;

    async fn set_subnets(&self, arn: &str, subnet_ids: Vec<String>) -> CloudResult<()>;

    async fn set_security_groups(&self, arn: &str, group_ids: Vec<String>) -> CloudResult<()>;

    async fn delete_load_balancer(&self, arn: &str) -> CloudResult<()>;

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    async fn create_listener(&self, input: CreateListenerInput) -> CloudResult<ListenerData>;

    async fn describe_listeners(&self, load_balancer_arn: &str) -> CloudResult<Vec<ListenerData>>;

    async fn modify_listener(
        &self,
        arn: &str,
        certificate_arn: Option<String>,
        default_action: ForwardAction,
    ) -> CloudResult<()>;

    async fn delete_listener(&self, arn: &str) -> CloudResult<()>;

    // ------------------------------------------------------------------
    // Listener rules
    // ------------------------------------------------------------------

    async fn create_rule(&self, input: CreateRuleInput) -> CloudResult<RuleData>;

    async fn describe_rules(&self, listener_arn: &str) -> CloudResult<Vec<RuleData>>;

    async fn modify_rule(
        &self,
        arn: &str,
        conditions: Vec<Condition>,
        action: ForwardAction,
    ) -> CloudResult<()>;

    async fn delete_rule(&self, arn: &str) -> CloudResult<()>;

    /// Reassign the numeric priorities of a listener's rules in one batch.
    async fn set_rule_priorities(&self, priorities: Vec<(String, u32)>) -> CloudResult<()>;

    // ------------------------------------------------------------------
    // Target groups
    // ------------------------------------------------------------------

    async fn create_target_group(
        &self,
        input: CreateTargetGroupInput,
    ) -> CloudResult<TargetGroupData>;

    async fn describe_target_groups(
        &self,
        marker: Option<String>,
    ) -> CloudResult<Page<TargetGroupData>>;

    async fn describe_target_group_by_name(
        &self,
        name: &str,
    ) -> CloudResult<Option<TargetGroupData>>;

    async fn modify_target_group(&self, arn: &str, health_check: HealthCheck) -> CloudResult<()>;

    async fn describe_target_group_attributes(
        &self,
        arn: &str,
    ) -> CloudResult<BTreeMap<String, String>>;

    async fn modify_target_group_attributes(
        &self,
        arn: &str,
        attributes: BTreeMap<String, String>,
    ) -> CloudResult<()>;

    async fn delete_target_group(&self, arn: &str) -> CloudResult<()>;

    // ------------------------------------------------------------------
    // Target registrations
    // ------------------------------------------------------------------

    async fn register_targets(
        &self,
        target_group_arn: &str,
        targets: Vec<TargetDescription>,
    ) -> CloudResult<()>;

    async fn deregister_targets(
        &self,
        target_group_arn: &str,
        targets: Vec<TargetDescription>,
    ) -> CloudResult<()>;

    async fn describe_target_health(
        &self,
        target_group_arn: &str,
    ) -> CloudResult<Vec<TargetHealth>>;

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    async fn describe_tags(&self, resource_arn: &str) -> CloudResult<BTreeMap<String, String>>;

    async fn add_tags(
        &self,
        resource_arn: &str,
        tags: BTreeMap<String, String>,
    ) -> CloudResult<()>;

    async fn remove_tags(&self, resource_arn: &str, keys: Vec<String>) -> CloudResult<()>;

    // ------------------------------------------------------------------
    // Security groups
    // ------------------------------------------------------------------

    async fn create_security_group(
        &self,
        input: CreateSecurityGroupInput,
    ) -> CloudResult<SecurityGroupData>;

    async fn describe_security_group(&self, id: &str) -> CloudResult<Option<SecurityGroupData>>;

    /// Describe all security groups whose `Name` tag is in `names`.
    async fn describe_security_groups_by_name_tags(
        &self,
        names: &[String],
    ) -> CloudResult<Vec<SecurityGroupData>>;

    async fn authorize_ingress(
        &self,
        group_id: &str,
        permissions: Vec<IpPermission>,
    ) -> CloudResult<()>;

    async fn revoke_ingress(
        &self,
        group_id: &str,
        permissions: Vec<IpPermission>,
    ) -> CloudResult<()>;

    async fn delete_security_group(&self, id: &str) -> CloudResult<()>;

    // ------------------------------------------------------------------
    // Subnets
    // ------------------------------------------------------------------

    async fn describe_subnets_by_ids(&self, ids: &[String]) -> CloudResult<Vec<SubnetData>>;

    /// Describe all subnets whose `Name` tag is in `names`.
    async fn describe_subnets_by_name_tags(&self, names: &[String])
        -> CloudResult<Vec<SubnetData>>;

    // ------------------------------------------------------------------
    // Web application firewall
    // ------------------------------------------------------------------

    async fn get_web_acl_for_resource(&self, resource_arn: &str) -> CloudResult<Option<String>>;

    async fn associate_web_acl(&self, resource_arn: &str, web_acl_id: &str) -> CloudResult<()>;

    async fn disassociate_web_acl(&self, resource_arn: &str) -> CloudResult<()>;
}
