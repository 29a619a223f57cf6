// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Target resolution for target group bindings.
//!
//! A binding keeps a target group's registrations in sync with its backing
//! Service. Resolution consults the cluster-side indexes, the only place
//! in the deployer that does: pod IPs from Endpoints for `ip` mode, node
//! instance IDs plus the service node port for `instance` mode.

use crate::aws::types::{TargetDescription, TargetType};
use crate::errors::ReconcileError;
use crate::model::ServiceRef;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, Node, Service};
use kube::runtime::reflector::Store;
use kube::ResourceExt;

/// Resolves the targets a service's backing workloads expose.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// The targets that should be registered for `service`.
    async fn resolve_targets(
        &self,
        service: &ServiceRef,
        target_type: TargetType,
    ) -> Result<Vec<TargetDescription>, ReconcileError>;
}

/// Production resolver reading the shared informer stores.
pub struct ClusterTargetResolver {
    pub services: Store<Service>,
    pub endpoints: Store<Endpoints>,
    pub nodes: Store<Node>,
}

impl ClusterTargetResolver {
    fn find_service(&self, service: &ServiceRef) -> Result<std::sync::Arc<Service>, ReconcileError> {
        self.services
            .state()
            .into_iter()
            .find(|s| {
                s.namespace().as_deref() == Some(&service.namespace) && s.name_any() == service.name
            })
            .ok_or_else(|| {
                ReconcileError::resolution(format!("service {service} not found in the index"))
            })
    }

    fn resolve_ip_targets(
        &self,
        service: &ServiceRef,
    ) -> Result<Vec<TargetDescription>, ReconcileError> {
        let svc = self.find_service(service)?;
        let port_spec = svc
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.as_ref())
            .and_then(|ports| {
                ports
                    .iter()
                    .find(|p| u16::try_from(p.port).ok() == Some(service.port))
            })
            .ok_or_else(|| {
                ReconcileError::validation(format!("service {service} exposes no such port"))
            })?;

        let endpoints = self
            .endpoints
            .state()
            .into_iter()
            .find(|e| {
                e.namespace().as_deref() == Some(&service.namespace) && e.name_any() == service.name
            })
            .ok_or_else(|| {
                ReconcileError::resolution(format!("endpoints for {service} not found"))
            })?;

        let mut targets = Vec::new();
        for subset in endpoints.subsets.iter().flatten() {
            let Some(port) = endpoint_port_for(subset, port_spec) else {
                continue;
            };
            for address in subset.addresses.iter().flatten() {
                targets.push(TargetDescription {
                    id: address.ip.clone(),
                    port,
                });
            }
        }
        targets.sort();
        targets.dedup();
        Ok(targets)
    }

    fn resolve_instance_targets(
        &self,
        service: &ServiceRef,
    ) -> Result<Vec<TargetDescription>, ReconcileError> {
        let svc = self.find_service(service)?;
        let node_port = svc
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.as_ref())
            .and_then(|ports| {
                ports
                    .iter()
                    .find(|p| u16::try_from(p.port).ok() == Some(service.port))
            })
            .and_then(|p| p.node_port)
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| {
                ReconcileError::validation(format!(
                    "service {service} has no node port; instance targets require a NodePort service"
                ))
            })?;

        let mut targets = Vec::new();
        for node in self.nodes.state() {
            if let Some(instance_id) = instance_id_of(&node) {
                targets.push(TargetDescription {
                    id: instance_id,
                    port: node_port,
                });
            }
        }
        targets.sort();
        targets.dedup();
        Ok(targets)
    }
}

#[async_trait]
impl TargetResolver for ClusterTargetResolver {
    async fn resolve_targets(
        &self,
        service: &ServiceRef,
        target_type: TargetType,
    ) -> Result<Vec<TargetDescription>, ReconcileError> {
        match target_type {
            TargetType::Ip => self.resolve_ip_targets(service),
            TargetType::Instance => self.resolve_instance_targets(service),
        }
    }
}

/// Pick the endpoint port a service port maps onto within one subset.
fn endpoint_port_for(
    subset: &k8s_openapi::api::core::v1::EndpointSubset,
    port_spec: &k8s_openapi::api::core::v1::ServicePort,
) -> Option<u16> {
    let ports = subset.ports.as_ref()?;

    // Named service ports match endpoint ports by name; unnamed services
    // have a single port and the subset carries exactly one entry
    let chosen = match &port_spec.name {
        Some(name) => ports.iter().find(|p| p.name.as_ref() == Some(name)),
        None => ports.first(),
    }?;
    u16::try_from(chosen.port).ok()
}

/// Cloud instance ID from a node's provider ID, e.g.
/// `aws:///us-east-1a/i-0abc...` -> `i-0abc...`.
fn instance_id_of(node: &Node) -> Option<String> {
    let provider_id = node.spec.as_ref()?.provider_id.as_ref()?;
    let last = provider_id.rsplit('/').next()?;
    if last.starts_with("i-") {
        Some(last.to_string())
    } else {
        None
    }
}

#[cfg(test)]
#[path = "targets_tests.rs"]
mod targets_tests;
