// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error taxonomy for the reconciliation core.
//!
//! Every failure surfaced out of a reconcile is one of the variants of
//! [`ReconcileError`]. The taxonomy drives requeue behavior:
//!
//! - `Validation`: annotation parse, stack, or group-consistency failure.
//!   Not retryable until the member changes; surfaced as a warning event.
//! - `Resolution`: a symbolic reference (subnet tag, security group tag)
//!   did not resolve. Retryable with backoff.
//! - `Cloud`: a cloud API call failed; retryability follows the call's
//!   [`CloudErrorKind`] classification.
//! - `Conflict`: optimistic-concurrency conflict on a cluster API write.
//!   Always retryable.
//! - `Invariant`: an internal bug such as resolving an unresolved
//!   reference at deploy time. Surfaced loudly; the reconcile aborts.

use thiserror::Error;

/// Classification of a cloud API failure.
///
/// `Throttling`, `ServerError` and `Timeout` are transient; the rest are
/// terminal for the current reconcile (the reconcile still re-enqueues, at
/// maximum backoff).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudErrorKind {
    /// Request was rate-limited by the cloud API
    Throttling,
    /// 5xx-class failure inside the cloud API
    ServerError,
    /// The call did not complete within its deadline
    Timeout,
    /// Credentials lack permission for the operation
    AccessDenied,
    /// The request was well-formed but semantically rejected
    InvalidParameter,
    /// The referenced cloud resource does not exist
    NotFound,
    /// A resource with the same identity already exists
    Conflict,
}

/// A failure returned by the cloud client facade.
#[derive(Error, Debug, Clone)]
#[error("cloud API error {code}: {message}")]
pub struct CloudError {
    /// Transient-vs-terminal classification
    pub kind: CloudErrorKind,
    /// Provider error code, e.g. `DuplicateLoadBalancerName`
    pub code: String,
    /// Human-readable detail
    pub message: String,
}

impl CloudError {
    /// Construct an error of the given kind.
    #[must_use]
    pub fn new(kind: CloudErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a `NotFound` error.
    #[must_use]
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::NotFound, code, message)
    }

    /// Shorthand for a `Conflict` (duplicate identity) error.
    #[must_use]
    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Conflict, code, message)
    }

    /// Whether the failed call may be retried in place.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            CloudErrorKind::Throttling | CloudErrorKind::ServerError | CloudErrorKind::Timeout
        )
    }
}

/// Composite error type for one group reconcile.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Annotation parse, stack validation, or group-consistency failure
    #[error("validation failed: {reason}")]
    Validation {
        /// What was invalid
        reason: String,
    },

    /// A symbolic reference could not be resolved to a cloud identifier
    #[error("resolution failed: {reason}")]
    Resolution {
        /// The unresolved tokens and context
        reason: String,
    },

    /// A cloud API call failed after facade-level retries
    #[error(transparent)]
    Cloud(#[from] CloudError),

    /// Optimistic-concurrency conflict writing to the cluster API
    #[error("cluster API conflict: {reason}")]
    Conflict {
        /// The write that conflicted
        reason: String,
    },

    /// Internal invariant violated; indicates a controller bug
    #[error("invariant violated: {reason}")]
    Invariant {
        /// The broken invariant
        reason: String,
    },
}

impl ReconcileError {
    /// Whether the reconcile should re-enqueue with normal backoff.
    ///
    /// Non-retryable errors still re-enqueue, but only member changes can
    /// clear them; the controller surfaces them as warning events instead
    /// of spinning.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation { .. } | Self::Invariant { .. } => false,
            Self::Resolution { .. } | Self::Conflict { .. } => true,
            Self::Cloud(err) => err.is_retryable(),
        }
    }

    /// Machine-readable reason used for events and metrics labels.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationFailed",
            Self::Resolution { .. } => "ResolutionFailed",
            Self::Cloud(err) => match err.kind {
                CloudErrorKind::Throttling => "CloudThrottled",
                CloudErrorKind::ServerError => "CloudServerError",
                CloudErrorKind::Timeout => "CloudTimeout",
                CloudErrorKind::AccessDenied => "CloudAccessDenied",
                CloudErrorKind::InvalidParameter => "CloudInvalidParameter",
                CloudErrorKind::NotFound => "CloudResourceNotFound",
                CloudErrorKind::Conflict => "CloudResourceConflict",
            },
            Self::Conflict { .. } => "ClusterConflict",
            Self::Invariant { .. } => "InvariantViolation",
        }
    }

    /// Shorthand for a validation failure.
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for a resolution failure.
    #[must_use]
    pub fn resolution(reason: impl Into<String>) -> Self {
        Self::Resolution {
            reason: reason.into(),
        }
    }

    /// Shorthand for an invariant violation.
    #[must_use]
    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::Invariant {
            reason: reason.into(),
        }
    }
}

impl From<kube::Error> for ReconcileError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(api_err) if api_err.code == 409 => Self::Conflict {
                reason: api_err.message.clone(),
            },
            _ => Self::Resolution {
                reason: format!("cluster API error: {err}"),
            },
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
