// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress status updates.
//!
//! Once the group's load balancer DNS name is resolvable, it is written to
//! every member's `status.loadBalancer.ingress`, which is what `kubectl
//! get ingress` shows under ADDRESS.

use crate::errors::ReconcileError;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Write the load balancer hostname to a member's status, when changed.
///
/// # Errors
///
/// Returns a `Conflict` error on concurrent status writes.
pub async fn publish_load_balancer_hostname(
    client: &Client,
    ingress: &Ingress,
    hostname: &str,
) -> Result<(), ReconcileError> {
    let namespace = ingress.namespace().unwrap_or_default();
    let name = ingress.name_any();

    let current = ingress
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|entries| entries.first())
        .and_then(|entry| entry.hostname.as_deref());

    if current == Some(hostname) {
        return Ok(());
    }

    debug!(
        ingress = %format!("{namespace}/{name}"),
        hostname,
        "publishing load balancer hostname to status"
    );

    let api: Api<Ingress> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({
        "status": {
            "loadBalancer": {
                "ingress": [{ "hostname": hostname }]
            }
        }
    });
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    Ok(())
}

