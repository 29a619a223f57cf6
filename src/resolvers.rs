// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Symbolic reference resolution.
//!
//! Annotations may name subnets and security groups either by cloud ID
//! (`subnet-`/`sg-` prefix) or by `Name` tag value. Resolvers pass IDs
//! through unchanged, batch-resolve the remaining names with a single
//! filtered describe call, and memoize every `name -> ID` mapping for the
//! lifetime of one reconcile. The memo is a per-reconcile scratchpad, so
//! no synchronization is needed.

use crate::aws::Cloud;
use crate::errors::ReconcileError;
use std::collections::{BTreeMap, HashMap};

/// Prefix marking an already-resolved subnet ID
const SUBNET_ID_PREFIX: &str = "subnet-";

/// Prefix marking an already-resolved security group ID
const SECURITY_GROUP_ID_PREFIX: &str = "sg-";

/// Per-reconcile resolver with memoized lookups.
pub struct ResourceResolvers<'a> {
    cloud: &'a Cloud,
    subnet_names: HashMap<String, String>,
    security_group_names: HashMap<String, String>,
}

impl<'a> ResourceResolvers<'a> {
    #[must_use]
    pub fn new(cloud: &'a Cloud) -> Self {
        Self {
            cloud,
            subnet_names: HashMap::new(),
            security_group_names: HashMap::new(),
        }
    }

    /// Resolve subnet tokens to an ordered list of subnet IDs.
    ///
    /// After resolution the set is validated: at least one subnet, every
    /// subnet exists, and no two subnets share an availability zone.
    ///
    /// # Errors
    ///
    /// `Resolution` errors name the unresolved tokens; duplicate
    /// availability zones are a `Validation` error.
    pub async fn resolve_subnets(
        &mut self,
        tokens: &[String],
    ) -> Result<Vec<String>, ReconcileError> {
        if tokens.is_empty() {
            return Err(ReconcileError::validation(
                "at least one subnet must be specified",
            ));
        }

        let mut ids = Vec::new();
        let mut names = Vec::new();
        for token in tokens {
            if token.starts_with(SUBNET_ID_PREFIX) {
                ids.push(token.clone());
            } else if let Some(id) = self.subnet_names.get(token) {
                ids.push(id.clone());
            } else {
                names.push(token.clone());
            }
        }

        if !names.is_empty() {
            let found = self.cloud.describe_subnets_by_name_tags(&names).await?;
            for subnet in &found {
                if let Some(name) = &subnet.name_tag {
                    self.subnet_names.insert(name.clone(), subnet.id.clone());
                }
            }
            let mut unresolved = Vec::new();
            for name in &names {
                match self.subnet_names.get(name) {
                    Some(id) => ids.push(id.clone()),
                    None => unresolved.push(name.clone()),
                }
            }
            if !unresolved.is_empty() {
                return Err(ReconcileError::resolution(format!(
                    "unable to resolve subnets by Name tag: {}",
                    unresolved.join(", ")
                )));
            }
        }

        ids.sort();
        ids.dedup();

        // Existence and availability-zone validation in one batch describe
        let described = self.cloud.describe_subnets_by_ids(&ids).await?;
        let mut missing = Vec::new();
        for id in &ids {
            if !described.iter().any(|s| &s.id == id) {
                missing.push(id.clone());
            }
        }
        if !missing.is_empty() {
            return Err(ReconcileError::resolution(format!(
                "subnets do not exist: {}",
                missing.join(", ")
            )));
        }

        let mut zones: BTreeMap<String, String> = BTreeMap::new();
        for subnet in &described {
            if let Some(other) = zones.insert(subnet.availability_zone.clone(), subnet.id.clone())
            {
                return Err(ReconcileError::validation(format!(
                    "subnets {other} and {} are in the same availability zone {}",
                    subnet.id, subnet.availability_zone
                )));
            }
        }

        Ok(ids)
    }

    /// Resolve security group tokens to an ordered list of group IDs.
    ///
    /// # Errors
    ///
    /// `Resolution` errors name the unresolved tokens or nonexistent IDs.
    pub async fn resolve_security_groups(
        &mut self,
        tokens: &[String],
    ) -> Result<Vec<String>, ReconcileError> {
        let mut ids = Vec::new();
        let mut names = Vec::new();
        for token in tokens {
            if token.starts_with(SECURITY_GROUP_ID_PREFIX) {
                ids.push(token.clone());
            } else if let Some(id) = self.security_group_names.get(token) {
                ids.push(id.clone());
            } else {
                names.push(token.clone());
            }
        }

        if !names.is_empty() {
            let found = self
                .cloud
                .describe_security_groups_by_name_tags(&names)
                .await?;
            for sg in &found {
                if let Some(name) = sg.tags.get(crate::labels::TAG_NAME) {
                    self.security_group_names
                        .insert(name.clone(), sg.id.clone());
                }
            }
            let mut unresolved = Vec::new();
            for name in &names {
                match self.security_group_names.get(name) {
                    Some(id) => ids.push(id.clone()),
                    None => unresolved.push(name.clone()),
                }
            }
            if !unresolved.is_empty() {
                return Err(ReconcileError::resolution(format!(
                    "unable to resolve security groups by Name tag: {}",
                    unresolved.join(", ")
                )));
            }
        }

        // Pass-through IDs must exist too
        for id in &ids {
            if id.starts_with(SECURITY_GROUP_ID_PREFIX)
                && self.cloud.describe_security_group(id).await?.is_none()
            {
                return Err(ReconcileError::resolution(format!(
                    "security group {id} does not exist"
                )));
            }
        }

        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "resolvers_tests.rs"]
mod resolvers_tests;
