// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The cloud client facade.
//!
//! [`Cloud`] wraps a [`CloudApi`] implementation and adds the per-call
//! middleware the raw seam does not provide:
//!
//! - retry with exponential backoff and jitter on transient failures
//!   (throttling, 5xx, timeout) while failing fast on terminal errors,
//! - client-side pagination for list calls, with loop protection against a
//!   next-token that never drains,
//! - per-call metrics (counter, duration histogram, retry counter).
//!
//! Tag-scoped discovery helpers (`find_*_by_tags`) compose the primitive
//! list and tag calls; they are the only way the controller looks up
//! existing resources, keeping discovery purely tag-based.

use crate::aws::api::{CloudApi, CloudResult};
use crate::aws::types::{
    Condition, CreateListenerInput, CreateLoadBalancerInput, CreateRuleInput,
    CreateSecurityGroupInput, CreateTargetGroupInput, ForwardAction, HealthCheck, IpPermission,
    ListenerData, LoadBalancerData, RuleData, SecurityGroupData, SubnetData, TargetDescription,
    TargetGroupData, TargetHealth,
};
use crate::constants::CLOUD_LIST_MAX_PAGES;
use crate::errors::CloudError;
use crate::metrics;
use rand::Rng;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// First retry delay for a throttled or failing cloud call
const RETRY_INITIAL_INTERVAL_MILLIS: u64 = 200;

/// Upper bound on the delay between retries of one call
const RETRY_MAX_INTERVAL_SECS: u64 = 10;

/// Total time budget for retrying one call
const RETRY_MAX_ELAPSED_SECS: u64 = 20;

/// Exponential growth factor between retries
const RETRY_MULTIPLIER: f64 = 2.0;

/// Jitter applied to each delay to avoid thundering herds
const RETRY_RANDOMIZATION_FACTOR: f64 = 0.1;

/// Per-call exponential backoff state.
struct CallBackoff {
    current_interval: Duration,
    started: Instant,
}

impl CallBackoff {
    fn new() -> Self {
        Self {
            current_interval: Duration::from_millis(RETRY_INITIAL_INTERVAL_MILLIS),
            started: Instant::now(),
        }
    }

    /// Next delay with jitter, or `None` once the elapsed budget is spent.
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.started.elapsed() >= Duration::from_secs(RETRY_MAX_ELAPSED_SECS) {
            return None;
        }

        let interval = self.current_interval;
        let next = interval.as_secs_f64() * RETRY_MULTIPLIER;
        self.current_interval =
            Duration::from_secs_f64(next).min(Duration::from_secs(RETRY_MAX_INTERVAL_SECS));

        let secs = interval.as_secs_f64();
        let delta = secs * RETRY_RANDOMIZATION_FACTOR;
        let jittered = rand::thread_rng().gen_range((secs - delta)..=(secs + delta));
        Some(Duration::from_secs_f64(jittered.max(0.0)))
    }
}

/// Cloud client facade; cheap to clone.
#[derive(Clone)]
pub struct Cloud {
    api: Arc<dyn CloudApi>,
}

impl Cloud {
    /// Wrap a raw cloud API implementation.
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self { api }
    }

    /// Run one cloud call with retry, backoff, and metrics.
    ///
    /// Terminal errors (permission denied, invalid parameter, not-found,
    /// conflict) are returned immediately; callers handle them per their
    /// own idempotence rules.
    async fn call<T, F, Fut>(&self, operation: &'static str, mut f: F) -> CloudResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CloudResult<T>>,
    {
        let mut backoff = CallBackoff::new();
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = f().await;

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "cloud call succeeded after retries");
                    }
                    metrics::record_cloud_call(operation, true, started.elapsed());
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    metrics::record_cloud_call(operation, false, started.elapsed());
                    return Err(err);
                }
                Err(err) => match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(
                            operation,
                            attempt,
                            retry_after = ?delay,
                            error = %err,
                            "transient cloud error, will retry"
                        );
                        metrics::record_cloud_retry(operation);
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(
                            operation,
                            attempt,
                            elapsed = ?started.elapsed(),
                            error = %err,
                            "cloud retry budget exhausted"
                        );
                        metrics::record_cloud_call(operation, false, started.elapsed());
                        return Err(err);
                    }
                },
            }
        }
    }

    // ------------------------------------------------------------------
    // Load balancers
    // ------------------------------------------------------------------

    pub async fn create_load_balancer(
        &self,
        input: CreateLoadBalancerInput,
    ) -> CloudResult<LoadBalancerData> {
        self.call("create_load_balancer", || {
            let api = Arc::clone(&self.api);
            let input = input.clone();
            async move { api.create_load_balancer(input).await }
        })
        .await
    }

    pub async fn describe_load_balancer_by_name(
        &self,
        name: &str,
    ) -> CloudResult<Option<LoadBalancerData>> {
        self.call("describe_load_balancer_by_name", || {
            let api = Arc::clone(&self.api);
            let name = name.to_string();
            async move { api.describe_load_balancer_by_name(&name).await }
        })
        .await
    }

    pub async fn set_subnets(&self, arn: &str, subnet_ids: Vec<String>) -> CloudResult<()> {
        self.call("set_subnets", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            let subnet_ids = subnet_ids.clone();
            async move { api.set_subnets(&arn, subnet_ids).await }
        })
        .await
    }

    pub async fn set_security_groups(&self, arn: &str, group_ids: Vec<String>) -> CloudResult<()> {
        self.call("set_security_groups", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            let group_ids = group_ids.clone();
            async move { api.set_security_groups(&arn, group_ids).await }
        })
        .await
    }

    pub async fn delete_load_balancer(&self, arn: &str) -> CloudResult<()> {
        self.call("delete_load_balancer", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            async move { api.delete_load_balancer(&arn).await }
        })
        .await
    }

    /// List every load balancer, following pagination markers.
    pub async fn list_all_load_balancers(&self) -> CloudResult<Vec<LoadBalancerData>> {
        let mut all = Vec::new();
        let mut marker = None;
        let mut pages = 0;

        loop {
            pages += 1;
            let page = self
                .call("describe_load_balancers", || {
                    let api = Arc::clone(&self.api);
                    let marker: Option<String> = marker.clone();
                    async move { api.describe_load_balancers(marker).await }
                })
                .await?;
            all.extend(page.items);

            // Empty-string markers mean "last page" on some providers
            match page.next.filter(|m| !m.is_empty()) {
                Some(next) if marker.as_ref() == Some(&next) => {
                    error!(marker = %next, "load balancer pagination returned the same marker twice, aborting");
                    break;
                }
                Some(next) => marker = Some(next),
                None => break,
            }

            if pages >= CLOUD_LIST_MAX_PAGES {
                error!(pages, "load balancer pagination exceeded the page safety limit, aborting");
                break;
            }
        }

        Ok(all)
    }

    /// Find the load balancers whose tags contain every entry of `tags`.
    pub async fn find_load_balancers_by_tags(
        &self,
        tags: &BTreeMap<String, String>,
    ) -> CloudResult<Vec<LoadBalancerData>> {
        let mut matched = Vec::new();
        for lb in self.list_all_load_balancers().await? {
            let lb_tags = self.describe_tags(&lb.arn).await?;
            if tags.iter().all(|(k, v)| lb_tags.get(k) == Some(v)) {
                matched.push(lb);
            }
        }
        Ok(matched)
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub async fn create_listener(&self, input: CreateListenerInput) -> CloudResult<ListenerData> {
        self.call("create_listener", || {
            let api = Arc::clone(&self.api);
            let input = input.clone();
            async move { api.create_listener(input).await }
        })
        .await
    }

    pub async fn describe_listeners(
        &self,
        load_balancer_arn: &str,
    ) -> CloudResult<Vec<ListenerData>> {
        self.call("describe_listeners", || {
            let api = Arc::clone(&self.api);
            let arn = load_balancer_arn.to_string();
            async move { api.describe_listeners(&arn).await }
        })
        .await
    }

    pub async fn modify_listener(
        &self,
        arn: &str,
        certificate_arn: Option<String>,
        default_action: ForwardAction,
    ) -> CloudResult<()> {
        self.call("modify_listener", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            let certificate_arn = certificate_arn.clone();
            let default_action = default_action.clone();
            async move { api.modify_listener(&arn, certificate_arn, default_action).await }
        })
        .await
    }

    pub async fn delete_listener(&self, arn: &str) -> CloudResult<()> {
        self.call("delete_listener", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            async move { api.delete_listener(&arn).await }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Listener rules
    // ------------------------------------------------------------------

    pub async fn create_rule(&self, input: CreateRuleInput) -> CloudResult<RuleData> {
        self.call("create_rule", || {
            let api = Arc::clone(&self.api);
            let input = input.clone();
            async move { api.create_rule(input).await }
        })
        .await
    }

    pub async fn describe_rules(&self, listener_arn: &str) -> CloudResult<Vec<RuleData>> {
        self.call("describe_rules", || {
            let api = Arc::clone(&self.api);
            let arn = listener_arn.to_string();
            async move { api.describe_rules(&arn).await }
        })
        .await
    }

    pub async fn modify_rule(
        &self,
        arn: &str,
        conditions: Vec<Condition>,
        action: ForwardAction,
    ) -> CloudResult<()> {
        self.call("modify_rule", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            let conditions = conditions.clone();
            let action = action.clone();
            async move { api.modify_rule(&arn, conditions, action).await }
        })
        .await
    }

    pub async fn delete_rule(&self, arn: &str) -> CloudResult<()> {
        self.call("delete_rule", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            async move { api.delete_rule(&arn).await }
        })
        .await
    }

    pub async fn set_rule_priorities(&self, priorities: Vec<(String, u32)>) -> CloudResult<()> {
        self.call("set_rule_priorities", || {
            let api = Arc::clone(&self.api);
            let priorities = priorities.clone();
            async move { api.set_rule_priorities(priorities).await }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Target groups
    // ------------------------------------------------------------------

    pub async fn create_target_group(
        &self,
        input: CreateTargetGroupInput,
    ) -> CloudResult<TargetGroupData> {
        self.call("create_target_group", || {
            let api = Arc::clone(&self.api);
            let input = input.clone();
            async move { api.create_target_group(input).await }
        })
        .await
    }

    pub async fn describe_target_group_by_name(
        &self,
        name: &str,
    ) -> CloudResult<Option<TargetGroupData>> {
        self.call("describe_target_group_by_name", || {
            let api = Arc::clone(&self.api);
            let name = name.to_string();
            async move { api.describe_target_group_by_name(&name).await }
        })
        .await
    }

    pub async fn modify_target_group(
        &self,
        arn: &str,
        health_check: HealthCheck,
    ) -> CloudResult<()> {
        self.call("modify_target_group", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            let health_check = health_check.clone();
            async move { api.modify_target_group(&arn, health_check).await }
        })
        .await
    }

    pub async fn describe_target_group_attributes(
        &self,
        arn: &str,
    ) -> CloudResult<BTreeMap<String, String>> {
        self.call("describe_target_group_attributes", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            async move { api.describe_target_group_attributes(&arn).await }
        })
        .await
    }

    pub async fn modify_target_group_attributes(
        &self,
        arn: &str,
        attributes: BTreeMap<String, String>,
    ) -> CloudResult<()> {
        self.call("modify_target_group_attributes", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            let attributes = attributes.clone();
            async move { api.modify_target_group_attributes(&arn, attributes).await }
        })
        .await
    }

    pub async fn delete_target_group(&self, arn: &str) -> CloudResult<()> {
        self.call("delete_target_group", || {
            let api = Arc::clone(&self.api);
            let arn = arn.to_string();
            async move { api.delete_target_group(&arn).await }
        })
        .await
    }

    /// List every target group, following pagination markers.
    pub async fn list_all_target_groups(&self) -> CloudResult<Vec<TargetGroupData>> {
        let mut all = Vec::new();
        let mut marker = None;
        let mut pages = 0;

        loop {
            pages += 1;
            let page = self
                .call("describe_target_groups", || {
                    let api = Arc::clone(&self.api);
                    let marker: Option<String> = marker.clone();
                    async move { api.describe_target_groups(marker).await }
                })
                .await?;
            all.extend(page.items);

            match page.next.filter(|m| !m.is_empty()) {
                Some(next) if marker.as_ref() == Some(&next) => {
                    error!(marker = %next, "target group pagination returned the same marker twice, aborting");
                    break;
                }
                Some(next) => marker = Some(next),
                None => break,
            }

            if pages >= CLOUD_LIST_MAX_PAGES {
                error!(pages, "target group pagination exceeded the page safety limit, aborting");
                break;
            }
        }

        Ok(all)
    }

    /// Find the target groups whose tags contain every entry of `tags`.
    pub async fn find_target_groups_by_tags(
        &self,
        tags: &BTreeMap<String, String>,
    ) -> CloudResult<Vec<TargetGroupData>> {
        let mut matched = Vec::new();
        for tg in self.list_all_target_groups().await? {
            let tg_tags = self.describe_tags(&tg.arn).await?;
            if tags.iter().all(|(k, v)| tg_tags.get(k) == Some(v)) {
                matched.push(tg);
            }
        }
        Ok(matched)
    }

    // ------------------------------------------------------------------
    // Target registrations
    // ------------------------------------------------------------------

    pub async fn register_targets(
        &self,
        target_group_arn: &str,
        targets: Vec<TargetDescription>,
    ) -> CloudResult<()> {
        self.call("register_targets", || {
            let api = Arc::clone(&self.api);
            let arn = target_group_arn.to_string();
            let targets = targets.clone();
            async move { api.register_targets(&arn, targets).await }
        })
        .await
    }

    pub async fn deregister_targets(
        &self,
        target_group_arn: &str,
        targets: Vec<TargetDescription>,
    ) -> CloudResult<()> {
        self.call("deregister_targets", || {
            let api = Arc::clone(&self.api);
            let arn = target_group_arn.to_string();
            let targets = targets.clone();
            async move { api.deregister_targets(&arn, targets).await }
        })
        .await
    }

    pub async fn describe_target_health(
        &self,
        target_group_arn: &str,
    ) -> CloudResult<Vec<TargetHealth>> {
        self.call("describe_target_health", || {
            let api = Arc::clone(&self.api);
            let arn = target_group_arn.to_string();
            async move { api.describe_target_health(&arn).await }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    pub async fn describe_tags(
        &self,
        resource_arn: &str,
    ) -> CloudResult<BTreeMap<String, String>> {
        self.call("describe_tags", || {
            let api = Arc::clone(&self.api);
            let arn = resource_arn.to_string();
            async move { api.describe_tags(&arn).await }
        })
        .await
    }

    pub async fn add_tags(
        &self,
        resource_arn: &str,
        tags: BTreeMap<String, String>,
    ) -> CloudResult<()> {
        self.call("add_tags", || {
            let api = Arc::clone(&self.api);
            let arn = resource_arn.to_string();
            let tags = tags.clone();
            async move { api.add_tags(&arn, tags).await }
        })
        .await
    }

    pub async fn remove_tags(&self, resource_arn: &str, keys: Vec<String>) -> CloudResult<()> {
        self.call("remove_tags", || {
            let api = Arc::clone(&self.api);
            let arn = resource_arn.to_string();
            let keys = keys.clone();
            async move { api.remove_tags(&arn, keys).await }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Security groups
    // ------------------------------------------------------------------

    pub async fn create_security_group(
        &self,
        input: CreateSecurityGroupInput,
    ) -> CloudResult<SecurityGroupData> {
        self.call("create_security_group", || {
            let api = Arc::clone(&self.api);
            let input = input.clone();
            async move { api.create_security_group(input).await }
        })
        .await
    }

    pub async fn describe_security_group(
        &self,
        id: &str,
    ) -> CloudResult<Option<SecurityGroupData>> {
        self.call("describe_security_group", || {
            let api = Arc::clone(&self.api);
            let id = id.to_string();
            async move { api.describe_security_group(&id).await }
        })
        .await
    }

    pub async fn describe_security_groups_by_name_tags(
        &self,
        names: &[String],
    ) -> CloudResult<Vec<SecurityGroupData>> {
        self.call("describe_security_groups_by_name_tags", || {
            let api = Arc::clone(&self.api);
            let names = names.to_vec();
            async move { api.describe_security_groups_by_name_tags(&names).await }
        })
        .await
    }

    pub async fn authorize_ingress(
        &self,
        group_id: &str,
        permissions: Vec<IpPermission>,
    ) -> CloudResult<()> {
        self.call("authorize_ingress", || {
            let api = Arc::clone(&self.api);
            let id = group_id.to_string();
            let permissions = permissions.clone();
            async move { api.authorize_ingress(&id, permissions).await }
        })
        .await
    }

    pub async fn revoke_ingress(
        &self,
        group_id: &str,
        permissions: Vec<IpPermission>,
    ) -> CloudResult<()> {
        self.call("revoke_ingress", || {
            let api = Arc::clone(&self.api);
            let id = group_id.to_string();
            let permissions = permissions.clone();
            async move { api.revoke_ingress(&id, permissions).await }
        })
        .await
    }

    pub async fn delete_security_group(&self, id: &str) -> CloudResult<()> {
        self.call("delete_security_group", || {
            let api = Arc::clone(&self.api);
            let id = id.to_string();
            async move { api.delete_security_group(&id).await }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Subnets
    // ------------------------------------------------------------------

    pub async fn describe_subnets_by_ids(&self, ids: &[String]) -> CloudResult<Vec<SubnetData>> {
        self.call("describe_subnets_by_ids", || {
            let api = Arc::clone(&self.api);
            let ids = ids.to_vec();
            async move { api.describe_subnets_by_ids(&ids).await }
        })
        .await
    }

    pub async fn describe_subnets_by_name_tags(
        &self,
        names: &[String],
    ) -> CloudResult<Vec<SubnetData>> {
        self.call("describe_subnets_by_name_tags", || {
            let api = Arc::clone(&self.api);
            let names = names.to_vec();
            async move { api.describe_subnets_by_name_tags(&names).await }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Web application firewall
    // ------------------------------------------------------------------

    pub async fn get_web_acl_for_resource(
        &self,
        resource_arn: &str,
    ) -> CloudResult<Option<String>> {
        self.call("get_web_acl_for_resource", || {
            let api = Arc::clone(&self.api);
            let arn = resource_arn.to_string();
            async move { api.get_web_acl_for_resource(&arn).await }
        })
        .await
    }

    pub async fn associate_web_acl(
        &self,
        resource_arn: &str,
        web_acl_id: &str,
    ) -> CloudResult<()> {
        self.call("associate_web_acl", || {
            let api = Arc::clone(&self.api);
            let arn = resource_arn.to_string();
            let acl = web_acl_id.to_string();
            async move { api.associate_web_acl(&arn, &acl).await }
        })
        .await
    }

    pub async fn disassociate_web_acl(&self, resource_arn: &str) -> CloudResult<()> {
        self.call("disassociate_web_acl", || {
            let api = Arc::clone(&self.api);
            let arn = resource_arn.to_string();
            async move { api.disassociate_web_acl(&arn).await }
        })
        .await
    }

    /// Classification helper: whether an error from `create_*` indicates a
    /// previously-successful create that should be adopted instead.
    #[must_use]
    pub fn is_adoptable_conflict(err: &CloudError) -> bool {
        err.kind == crate::errors::CloudErrorKind::Conflict
    }
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod facade_tests;
