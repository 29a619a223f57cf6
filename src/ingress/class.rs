// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress-class scoping.
//!
//! An Ingress is in scope for this controller iff its
//! `spec.ingressClassName` (or the legacy `kubernetes.io/ingress.class`
//! annotation, which wins when both are set) equals the configured class,
//! or it names no class at all and this controller is the configured
//! default.

use crate::config::ControllerConfig;
use crate::labels::ANNOTATION_INGRESS_CLASS;
use k8s_openapi::api::networking::v1::Ingress;

/// Whether this controller handles the given Ingress.
#[must_use]
pub fn is_in_scope(ingress: &Ingress, config: &ControllerConfig) -> bool {
    let annotation_class = ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_INGRESS_CLASS))
        .map(String::as_str)
        .filter(|c| !c.is_empty());

    let spec_class = ingress
        .spec
        .as_ref()
        .and_then(|s| s.ingress_class_name.as_deref())
        .filter(|c| !c.is_empty());

    match annotation_class.or(spec_class) {
        Some(class) => class == config.ingress_class,
        None => config.default_class,
    }
}

#[cfg(test)]
#[path = "class_tests.rs"]
mod class_tests;
