// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Group identity and membership.
//!
//! A group is the unit of reconciliation: one load balancer serves all of
//! a group's members. Explicit groups are named by the `group.name`
//! annotation; an Ingress without one forms an implicit group identified
//! by its own `namespace/name`.
//!
//! The loader classifies every Ingress in the informer index into active
//! members (currently contributing rules) and inactive members (still
//! carrying this group's finalizer but no longer qualifying); actives are
//! ordered deterministically by `(group.order, namespace, name)`.

use crate::config::ControllerConfig;
use crate::errors::ReconcileError;
use crate::ingress::class::is_in_scope;
use crate::labels::{
    group_finalizer, ANNOTATION_GROUP_NAME, ANNOTATION_GROUP_ORDER, IMPLICIT_GROUP_FINALIZER,
};
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Identity of one ingress group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupId {
    /// Named via the `group.name` annotation; shared across namespaces
    Explicit(String),
    /// A single unannotated Ingress, identified by `namespace/name`
    Implicit {
        namespace: String,
        name: String,
    },
}

impl GroupId {
    #[must_use]
    pub fn explicit(name: impl Into<String>) -> Self {
        Self::Explicit(name.into())
    }

    #[must_use]
    pub fn implicit(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Implicit {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The finalizer members of this group carry.
    #[must_use]
    pub fn finalizer(&self) -> String {
        match self {
            Self::Explicit(name) => group_finalizer(name),
            Self::Implicit { .. } => IMPLICIT_GROUP_FINALIZER.to_string(),
        }
    }

    /// Stable string identity, used for tags and name hashing.
    #[must_use]
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(name) => f.write_str(name),
            Self::Implicit { namespace, name } => write!(f, "{namespace}/{name}"),
        }
    }
}

/// One active member of a group.
#[derive(Clone)]
#[derive(Debug)]
pub struct Member {
    pub ingress: Arc<Ingress>,
    /// Value of the `group.order` annotation, default 0
    pub order: i64,
}

impl Member {
    #[must_use]
    pub fn namespace(&self) -> String {
        self.ingress.namespace().unwrap_or_default()
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.ingress.name_any()
    }
}

/// A loaded group: ordered active members plus the inactive members whose
/// finalizers must be released once the deploy succeeds.
#[derive(Debug)]
pub struct Group {
    pub id: GroupId,
    pub members: Vec<Member>,
    pub inactive_members: Vec<Arc<Ingress>>,
}

impl Group {
    /// Whether this reconcile is a teardown (no members contribute rules).
    #[must_use]
    pub fn is_teardown(&self) -> bool {
        self.members.is_empty()
    }
}

fn group_annotation(ingress: &Ingress) -> Option<&str> {
    ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_GROUP_NAME))
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

fn order_annotation(ingress: &Ingress) -> Result<i64, ReconcileError> {
    match ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_GROUP_ORDER))
    {
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            ReconcileError::validation(format!(
                "invalid {ANNOTATION_GROUP_ORDER} `{raw}` on {}/{}",
                ingress.namespace().unwrap_or_default(),
                ingress.name_any()
            ))
        }),
        None => Ok(0),
    }
}

/// The group an in-scope Ingress belongs to; `None` when out of scope.
#[must_use]
pub fn group_of(ingress: &Ingress, config: &ControllerConfig) -> Option<GroupId> {
    if !is_in_scope(ingress, config) {
        return None;
    }
    Some(match group_annotation(ingress) {
        Some(name) => GroupId::explicit(name),
        None => GroupId::implicit(ingress.namespace().unwrap_or_default(), ingress.name_any()),
    })
}

/// Whether this Ingress currently qualifies as an active member of `group`.
fn is_active_member(ingress: &Ingress, group: &GroupId, config: &ControllerConfig) -> bool {
    if ingress.metadata.deletion_timestamp.is_some() {
        return false;
    }
    group_of(ingress, config).as_ref() == Some(group)
}

/// Whether this Ingress holds `group`'s finalizer.
fn holds_finalizer(ingress: &Ingress, group: &GroupId) -> bool {
    let finalizer = group.finalizer();
    let held = ingress
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.contains(&finalizer));
    match group {
        GroupId::Explicit(_) => held,
        // The implicit finalizer is shared; it only binds the member that
        // is the group
        GroupId::Implicit { namespace, name } => {
            held && ingress.namespace().unwrap_or_default() == *namespace
                && ingress.name_any() == *name
        }
    }
}

/// Load `(active, inactive)` membership for one group from the informer
/// index.
///
/// # Errors
///
/// Fails with a validation error when a member carries an unparseable
/// `group.order` annotation.
pub fn load(
    all_ingresses: &[Arc<Ingress>],
    group: &GroupId,
    config: &ControllerConfig,
) -> Result<Group, ReconcileError> {
    let mut members = Vec::new();
    let mut inactive_members = Vec::new();

    for ingress in all_ingresses {
        if is_active_member(ingress, group, config) {
            members.push(Member {
                ingress: Arc::clone(ingress),
                order: order_annotation(ingress)?,
            });
        } else if holds_finalizer(ingress, group) {
            inactive_members.push(Arc::clone(ingress));
        }
    }

    members.sort_by(|a, b| {
        (a.order, a.namespace(), a.name()).cmp(&(b.order, b.namespace(), b.name()))
    });

    Ok(Group {
        id: group.clone(),
        members,
        inactive_members,
    })
}

// ============================================================================
// Reverse index
// ============================================================================

/// Groups whose Ingresses reference the given Service.
///
/// Used by the Service/Endpoints watch mappers to enqueue only affected
/// groups.
#[must_use]
pub fn groups_referencing_service(
    all_ingresses: &[Arc<Ingress>],
    namespace: &str,
    service_name: &str,
    config: &ControllerConfig,
) -> BTreeSet<GroupId> {
    let mut groups = BTreeSet::new();
    for ingress in all_ingresses {
        if ingress.namespace().unwrap_or_default() != namespace {
            continue;
        }
        let Some(group) = group_of(ingress, config) else {
            continue;
        };
        if references_service(ingress, service_name) {
            groups.insert(group);
        }
    }
    groups
}

fn references_service(ingress: &Ingress, service_name: &str) -> bool {
    let Some(spec) = ingress.spec.as_ref() else {
        return false;
    };

    let backend_matches = |backend: &k8s_openapi::api::networking::v1::IngressBackend| {
        backend
            .service
            .as_ref()
            .is_some_and(|s| s.name == service_name)
    };

    if spec.default_backend.as_ref().is_some_and(backend_matches) {
        return true;
    }

    spec.rules.iter().flatten().any(|rule| {
        rule.http.as_ref().is_some_and(|http| {
            http.paths.iter().any(|path| backend_matches(&path.backend))
        })
    })
}

/// Every group represented in the informer index, in-scope finalizer
/// holders included.
///
/// Node events affect instance-mode targets of any group, so they enqueue
/// all of these.
#[must_use]
pub fn all_groups(all_ingresses: &[Arc<Ingress>], config: &ControllerConfig) -> BTreeSet<GroupId> {
    let mut groups = BTreeSet::new();
    for ingress in all_ingresses {
        if let Some(group) = group_of(ingress, config) {
            groups.insert(group);
        }
        // An out-of-scope Ingress may still hold a finalizer from a prior
        // configuration; its group must keep reconciling until release
        for finalizer in ingress.metadata.finalizers.iter().flatten() {
            if let Some(name) = finalizer.strip_prefix(crate::labels::GROUP_FINALIZER_PREFIX) {
                groups.insert(GroupId::explicit(name));
            } else if finalizer == IMPLICIT_GROUP_FINALIZER {
                groups.insert(GroupId::implicit(
                    ingress.namespace().unwrap_or_default(),
                    ingress.name_any(),
                ));
            }
        }
    }
    groups
}

/// Groups an Ingress event maps to: its current group, plus any group
/// whose finalizer it still carries (covering moves between groups).
#[must_use]
pub fn groups_of_ingress_event(
    ingress: &Ingress,
    config: &ControllerConfig,
) -> BTreeSet<GroupId> {
    let mut groups = BTreeSet::new();
    if let Some(group) = group_of(ingress, config) {
        groups.insert(group);
    }
    for finalizer in ingress.metadata.finalizers.iter().flatten() {
        if let Some(name) = finalizer.strip_prefix(crate::labels::GROUP_FINALIZER_PREFIX) {
            groups.insert(GroupId::explicit(name));
        } else if finalizer == IMPLICIT_GROUP_FINALIZER {
            groups.insert(GroupId::implicit(
                ingress.namespace().unwrap_or_default(),
                ingress.name_any(),
            ));
        }
    }
    groups
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod group_tests;
