// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Annotation parsing for member Ingresses.
//!
//! Decodes the string-valued annotation map of one Ingress (merged over
//! cluster-level defaults) into a typed [`IngressAnnotations`] record.
//! Parsing is a pure function of its inputs and never performs I/O;
//! symbolic values such as subnet names are carried verbatim for the
//! resolvers.
//!
//! A process-wide negative cache remembers annotation maps that failed to
//! parse so persistently broken members do not turn every watch event into
//! a full reconcile attempt.

use crate::aws::types::{HealthCheck, Protocol, Scheme, TargetType};
use crate::constants::ANNOTATION_ERROR_CACHE_TTL_SECS;
use crate::labels;
use crate::metrics;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A failure decoding one annotation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    /// The value did not decode into the expected type
    #[error("invalid value `{value}` for annotation {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// One or more tokens of a `key=value` list were malformed
    #[error("unable to parse `{tokens}` into key=value pair(s) for annotation {key}")]
    MalformedKeyValue {
        key: String,
        /// The offending tokens, comma-joined
        tokens: String,
    },
}

/// Typed configuration decoded from one member's annotations.
///
/// Load-balancer-scoped fields (`scheme`, `subnets`, `security_groups`,
/// `tags`, `wafacl_id`, `inbound_cidrs`) are merged first-member-wins at
/// the group level; the rest apply per member.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngressAnnotations {
    pub scheme: Option<Scheme>,
    /// Raw subnet tokens: IDs (`subnet-` prefix) or `Name` tag values
    pub subnets: Vec<String>,
    /// Raw security group tokens; empty means the controller manages one
    pub security_groups: Vec<String>,
    pub certificate_arn: Option<String>,
    /// Explicit listener ports; see [`Self::effective_listen_ports`]
    pub listen_ports: Option<Vec<u16>>,
    pub backend_protocol: Protocol,
    pub health_check: HealthCheck,
    pub target_type: TargetType,
    pub target_group_attributes: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    pub wafacl_id: Option<String>,
    /// CIDRs granted inbound on the managed security group; empty means
    /// unset, and the builder defaults to `0.0.0.0/0`
    pub inbound_cidrs: Vec<String>,
    pub group_name: Option<String>,
    pub group_order: i64,
}

impl IngressAnnotations {
    /// Decode an annotation map, with `defaults` supplying cluster-level
    /// values for keys the resource does not set.
    ///
    /// # Errors
    ///
    /// Returns the first [`AnnotationError`] encountered; list-valued
    /// annotations fail atomically.
    pub fn parse(
        annotations: &BTreeMap<String, String>,
        defaults: &BTreeMap<String, String>,
    ) -> Result<Self, AnnotationError> {
        let get = |key: &str| -> Option<&str> {
            annotations
                .get(key)
                .or_else(|| defaults.get(key))
                .map(String::as_str)
                .filter(|v| !v.is_empty())
        };

        let scheme = get(labels::ANNOTATION_SCHEME)
            .map(parse_scheme)
            .transpose()?;

        let subnets = get(labels::ANNOTATION_SUBNETS)
            .map(split_csv)
            .unwrap_or_default();

        let security_groups = get(labels::ANNOTATION_SECURITY_GROUPS)
            .map(split_csv)
            .unwrap_or_default();

        let certificate_arn = get(labels::ANNOTATION_CERTIFICATE_ARN).map(str::to_string);

        let listen_ports = get(labels::ANNOTATION_LISTEN_PORTS)
            .map(parse_ports)
            .transpose()?;

        let backend_protocol = get(labels::ANNOTATION_BACKEND_PROTOCOL)
            .map(parse_backend_protocol)
            .transpose()?
            .unwrap_or(Protocol::Http);

        let health_check = HealthCheck {
            path: get(labels::ANNOTATION_HEALTHCHECK_PATH)
                .map_or_else(|| "/".to_string(), str::to_string),
            healthy_threshold: get(labels::ANNOTATION_HEALTHY_THRESHOLD)
                .map(|v| parse_count(labels::ANNOTATION_HEALTHY_THRESHOLD, v))
                .transpose()?
                .unwrap_or(2),
            unhealthy_threshold: get(labels::ANNOTATION_UNHEALTHY_THRESHOLD)
                .map(|v| parse_count(labels::ANNOTATION_UNHEALTHY_THRESHOLD, v))
                .transpose()?
                .unwrap_or(2),
            success_codes: get(labels::ANNOTATION_SUCCESS_CODES)
                .map_or_else(|| "200".to_string(), str::to_string),
        };

        let target_type = get(labels::ANNOTATION_TARGET_TYPE)
            .map(parse_target_type)
            .transpose()?
            .unwrap_or(TargetType::Instance);

        let target_group_attributes = get(labels::ANNOTATION_TARGET_GROUP_ATTRIBUTES)
            .map(|v| parse_kv_list(labels::ANNOTATION_TARGET_GROUP_ATTRIBUTES, v))
            .transpose()?
            .unwrap_or_default();

        let tags = get(labels::ANNOTATION_TAGS)
            .map(|v| parse_kv_list(labels::ANNOTATION_TAGS, v))
            .transpose()?
            .unwrap_or_default();

        let wafacl_id = get(labels::ANNOTATION_WAFACL_ID).map(str::to_string);

        let inbound_cidrs = get(labels::ANNOTATION_INBOUND_CIDRS)
            .map(split_csv)
            .unwrap_or_default();

        let group_name = get(labels::ANNOTATION_GROUP_NAME).map(str::to_string);

        let group_order = get(labels::ANNOTATION_GROUP_ORDER)
            .map(|v| {
                v.parse::<i64>().map_err(|_| AnnotationError::InvalidValue {
                    key: labels::ANNOTATION_GROUP_ORDER.to_string(),
                    value: v.to_string(),
                    reason: "must be an integer".to_string(),
                })
            })
            .transpose()?
            .unwrap_or(0);

        Ok(Self {
            scheme,
            subnets,
            security_groups,
            certificate_arn,
            listen_ports,
            backend_protocol,
            health_check,
            target_type,
            target_group_attributes,
            tags,
            wafacl_id,
            inbound_cidrs,
            group_name,
            group_order,
        })
    }

    /// Listener ports after defaulting: 80 without a certificate, 443 with.
    #[must_use]
    pub fn effective_listen_ports(&self) -> Vec<u16> {
        match &self.listen_ports {
            Some(ports) if !ports.is_empty() => ports.clone(),
            _ if self.certificate_arn.is_some() => vec![443],
            _ => vec![80],
        }
    }
}

fn parse_scheme(value: &str) -> Result<Scheme, AnnotationError> {
    match value {
        "internal" => Ok(Scheme::Internal),
        "internet-facing" => Ok(Scheme::InternetFacing),
        other => Err(AnnotationError::InvalidValue {
            key: labels::ANNOTATION_SCHEME.to_string(),
            value: other.to_string(),
            reason: "must be `internal` or `internet-facing`".to_string(),
        }),
    }
}

fn parse_backend_protocol(value: &str) -> Result<Protocol, AnnotationError> {
    match value {
        "HTTP" => Ok(Protocol::Http),
        "HTTPS" => Ok(Protocol::Https),
        other => Err(AnnotationError::InvalidValue {
            key: labels::ANNOTATION_BACKEND_PROTOCOL.to_string(),
            value: other.to_string(),
            reason: "must be `HTTP` or `HTTPS`".to_string(),
        }),
    }
}

fn parse_target_type(value: &str) -> Result<TargetType, AnnotationError> {
    match value {
        "instance" => Ok(TargetType::Instance),
        "ip" => Ok(TargetType::Ip),
        other => Err(AnnotationError::InvalidValue {
            key: labels::ANNOTATION_TARGET_TYPE.to_string(),
            value: other.to_string(),
            reason: "must be `instance` or `ip`".to_string(),
        }),
    }
}

fn parse_ports(value: &str) -> Result<Vec<u16>, AnnotationError> {
    let mut ports = Vec::new();
    for token in split_csv(value) {
        let port = token
            .parse::<u16>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| AnnotationError::InvalidValue {
                key: labels::ANNOTATION_LISTEN_PORTS.to_string(),
                value: token.clone(),
                reason: "must be a port number between 1 and 65535".to_string(),
            })?;
        if !ports.contains(&port) {
            ports.push(port);
        }
    }
    Ok(ports)
}

fn parse_count(key: &str, value: &str) -> Result<u32, AnnotationError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|c| *c > 0)
        .ok_or_else(|| AnnotationError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a positive integer".to_string(),
        })
}

/// Split a comma-separated list, trimming whitespace and dropping empties.
#[must_use]
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a comma-separated `key=value` list.
///
/// A single malformed token fails the whole annotation, naming every bad
/// token in the error.
fn parse_kv_list(key: &str, value: &str) -> Result<BTreeMap<String, String>, AnnotationError> {
    let mut out = BTreeMap::new();
    let mut bad = Vec::new();

    for token in split_csv(value) {
        match token.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => {
                out.insert(k.trim().to_string(), v.trim().to_string());
            }
            _ => bad.push(token),
        }
    }

    if bad.is_empty() {
        Ok(out)
    } else {
        Err(AnnotationError::MalformedKeyValue {
            key: key.to_string(),
            tokens: bad.join(", "),
        })
    }
}

// ============================================================================
// Negative cache
// ============================================================================

/// Process-wide TTL cache of annotation maps that failed to parse.
///
/// Keyed by a digest of the sorted annotation entries; a hit means the same
/// map failed within the TTL and re-parsing it would fail identically.
pub struct BadAnnotationCache {
    entries: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
}

impl Default for BadAnnotationCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(ANNOTATION_ERROR_CACHE_TTL_SECS))
    }
}

impl BadAnnotationCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Digest of an annotation map, stable across entry order.
    #[must_use]
    pub fn fingerprint(annotations: &BTreeMap<String, String>) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in annotations {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    /// Whether this map failed within the TTL.
    #[must_use]
    pub fn contains(&self, fingerprint: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries
            .get(fingerprint)
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Remember a failed map, pruning expired entries as a side effect.
    pub fn insert(&self, fingerprint: String) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let ttl = self.ttl;
        entries.retain(|_, at| at.elapsed() < ttl);
        entries.insert(fingerprint, Instant::now());
    }

    /// Parse through the cache: a cached failure short-circuits without
    /// re-parsing, and a fresh failure populates the cache.
    ///
    /// # Errors
    ///
    /// Propagates the underlying [`AnnotationError`]; cached failures are
    /// reported generically since the original error is not retained.
    pub fn parse_cached(
        &self,
        annotations: &BTreeMap<String, String>,
        defaults: &BTreeMap<String, String>,
    ) -> Result<IngressAnnotations, AnnotationError> {
        let fingerprint = Self::fingerprint(annotations);
        if self.contains(&fingerprint) {
            metrics::ANNOTATION_CACHE_HITS_TOTAL
                .with_label_values(&["hit"])
                .inc();
            return Err(AnnotationError::InvalidValue {
                key: labels::ANNOTATION_PREFIX.to_string(),
                value: String::new(),
                reason: "annotations previously failed to parse (cached)".to_string(),
            });
        }
        metrics::ANNOTATION_CACHE_HITS_TOTAL
            .with_label_values(&["miss"])
            .inc();

        match IngressAnnotations::parse(annotations, defaults) {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                self.insert(fingerprint);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "annotations_tests.rs"]
mod annotations_tests;
