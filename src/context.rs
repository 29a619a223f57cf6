// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the controller with reflector stores.
//!
//! All reconcile paths receive an `Arc<Context>` holding the Kubernetes
//! client, the reflector stores for every watched resource type, the cloud
//! facade, configuration, the event publisher, and the annotation negative
//! cache. The stores enable in-memory lookups without API queries in watch
//! mappers and during group loading.

use crate::annotations::BadAnnotationCache;
use crate::aws::Cloud;
use crate::config::ControllerConfig;
use crate::events::EventPublisher;
use k8s_openapi::api::core::v1::{Endpoints, Node, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::Store;
use kube::Client;
use std::sync::Arc;

/// Reflector stores for every watched resource type.
///
/// Each store is populated by a dedicated watch task and provides
/// in-memory access to resources without API calls.
#[derive(Clone)]
pub struct Stores {
    pub ingresses: Store<Ingress>,
    pub services: Store<Service>,
    pub endpoints: Store<Endpoints>,
    pub nodes: Store<Node>,
}

/// Shared context passed to workers and watch mappers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API writes (finalizers, status)
    pub client: Client,
    /// Read-only informer caches
    pub stores: Stores,
    /// Cloud client facade
    pub cloud: Cloud,
    /// Static controller configuration
    pub config: Arc<ControllerConfig>,
    /// Fire-and-forget event publisher
    pub events: Arc<dyn EventPublisher>,
    /// Process-wide negative cache for broken annotations
    pub annotation_cache: Arc<BadAnnotationCache>,
}
