// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared helpers for the reconcile pipeline tests.

use alby::annotations::IngressAnnotations;
use alby::aws::fake::InMemoryCloud;
use alby::aws::types::{Scheme, TargetDescription, TargetType};
use alby::aws::Cloud;
use alby::config::ControllerConfig;
use alby::deploy::targets::TargetResolver;
use alby::errors::ReconcileError;
use alby::ingress::group::{GroupId, Member};
use alby::model::builder::{
    build_stack, merge_lb_attributes, BuildContext, MemberConfig, ResolvedLbConfig,
};
use alby::model::{ServiceRef, Stack};
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;

/// Fixed node targets standing in for the cluster indexes.
pub struct FixedTargets(pub Vec<TargetDescription>);

#[async_trait]
impl TargetResolver for FixedTargets {
    async fn resolve_targets(
        &self,
        _service: &ServiceRef,
        _target_type: TargetType,
    ) -> Result<Vec<TargetDescription>, ReconcileError> {
        Ok(self.0.clone())
    }
}

pub fn default_targets() -> FixedTargets {
    FixedTargets(vec![TargetDescription {
        id: "i-0aaa".to_string(),
        port: 30080,
    }])
}

pub fn test_cloud() -> (Arc<InMemoryCloud>, Cloud) {
    let fake = Arc::new(InMemoryCloud::new());
    fake.add_subnet("subnet-a", "us-east-1a", Some("apps-a"));
    fake.add_subnet("subnet-b", "us-east-1b", Some("apps-b"));
    let cloud = Cloud::new(fake.clone());
    (fake, cloud)
}

pub fn config() -> ControllerConfig {
    ControllerConfig {
        vpc_id: "vpc-1".to_string(),
        ..Default::default()
    }
}

pub fn group() -> GroupId {
    GroupId::explicit("shared")
}

/// An Ingress with `(host, path, service, port)` routing rules.
pub fn make_ingress(
    namespace: &str,
    name: &str,
    rules: &[(Option<&str>, &str, &str, u16)],
) -> Arc<Ingress> {
    let ingress_rules = rules
        .iter()
        .map(|(host, path, service, port)| IngressRule {
            host: host.map(str::to_string),
            http: Some(HTTPIngressRuleValue {
                paths: vec![HTTPIngressPath {
                    backend: IngressBackend {
                        resource: None,
                        service: Some(IngressServiceBackend {
                            name: (*service).to_string(),
                            port: Some(ServiceBackendPort {
                                name: None,
                                number: Some(i32::from(*port)),
                            }),
                        }),
                    },
                    path: Some((*path).to_string()),
                    path_type: "Prefix".to_string(),
                }],
            }),
        })
        .collect();

    Arc::new(Ingress {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(ingress_rules),
            ..Default::default()
        }),
        status: None,
    })
}

/// Annotations for the group's first member.
pub fn primary_annotations() -> IngressAnnotations {
    IngressAnnotations {
        scheme: Some(Scheme::InternetFacing),
        subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
        ..Default::default()
    }
}

pub fn member(ingress: Arc<Ingress>, annotations: IngressAnnotations) -> MemberConfig {
    MemberConfig {
        member: Member { ingress, order: 0 },
        annotations,
    }
}

/// Build the desired stack for a set of members, resolving subnets the
/// way the reconcile pipeline would.
pub async fn build_desired(
    cloud: &Cloud,
    configs: &[MemberConfig],
) -> Result<Stack, ReconcileError> {
    if configs.is_empty() {
        return Ok(Stack::new());
    }
    let merged = merge_lb_attributes(configs)?;
    let mut resolvers = alby::resolvers::ResourceResolvers::new(cloud);
    let subnet_ids = resolvers.resolve_subnets(&merged.subnet_tokens).await?;
    let security_group_ids = if merged.security_group_tokens.is_empty() {
        Vec::new()
    } else {
        resolvers
            .resolve_security_groups(&merged.security_group_tokens)
            .await?
    };
    let group = group();
    let ctx = BuildContext {
        group_id: &group,
        controller_id: "alby",
        vpc_id: "vpc-1",
    };
    build_stack(
        &ctx,
        configs,
        &ResolvedLbConfig {
            scheme: merged.scheme,
            subnet_ids,
            security_group_ids,
            tags: merged.tags,
            wafacl_id: merged.wafacl_id,
            inbound_cidrs: merged.inbound_cidrs,
        },
    )
}

/// One reconcile pass against the in-memory cloud: assemble, diff, deploy.
/// Returns the number of mutations the plan carried.
pub async fn reconcile_once(cloud: &Cloud, stack: &Stack) -> Result<usize, ReconcileError> {
    let topology = alby::assembler::assemble(cloud, &config(), &group()).await?;
    let plan = alby::diff::diff(stack, &topology)?;
    let mutations = plan.mutation_count();
    let targets = default_targets();
    let deployer = alby::deploy::StackDeployer::new(cloud, &targets);
    deployer.deploy(stack, &plan).await?;
    Ok(mutations)
}
