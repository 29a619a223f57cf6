// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Group finalizer management on member Ingresses.
//!
//! The finalizer is added to every active member before model building and
//! removed from inactive members only after a successful deploy, so the
//! controller never loses track of a member whose contribution is still
//! deployed. Both operations are idempotent merge patches.

use crate::errors::ReconcileError;
use crate::ingress::group::GroupId;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::info;

/// Add the group finalizer to an Ingress if not already present.
///
/// # Errors
///
/// Returns a `Conflict` error on concurrent metadata writes, which the
/// caller re-enqueues.
pub async fn ensure_group_finalizer(
    client: &Client,
    ingress: &Ingress,
    group: &GroupId,
) -> Result<(), ReconcileError> {
    let finalizer = group.finalizer();
    let namespace = ingress.namespace().unwrap_or_default();
    let name = ingress.name_any();

    if ingress
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.contains(&finalizer))
    {
        return Ok(());
    }

    info!(group = %group, ingress = %format!("{namespace}/{name}"), "adding group finalizer");

    let mut finalizers = ingress.metadata.finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer);

    let api: Api<Ingress> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    Ok(())
}

/// Remove the group finalizer from an Ingress if present.
///
/// # Errors
///
/// Returns a `Conflict` error on concurrent metadata writes.
pub async fn remove_group_finalizer(
    client: &Client,
    ingress: &Ingress,
    group: &GroupId,
) -> Result<(), ReconcileError> {
    let finalizer = group.finalizer();
    let namespace = ingress.namespace().unwrap_or_default();
    let name = ingress.name_any();

    if !ingress
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.contains(&finalizer))
    {
        return Ok(());
    }

    info!(group = %group, ingress = %format!("{namespace}/{name}"), "removing group finalizer");

    let mut finalizers = ingress.metadata.finalizers.clone().unwrap_or_default();
    finalizers.retain(|f| f != &finalizer);

    let api: Api<Ingress> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    Ok(())
}

