// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The group work queue.
//!
//! Per-group single-flight with coalescing: at most one reconcile per
//! group runs at a time, and enqueues arriving while a group is in flight
//! collapse into a single follow-up run. Failed reconciles re-enqueue with
//! bounded exponential backoff that resets on the first success. The queue
//! is the only synchronization point between workers; within one reconcile
//! no shared mutable state exists.

use crate::ingress::group::GroupId;
use crate::metrics;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    /// Waiting in the ready list
    Queued,
    /// A worker is reconciling it
    Running,
    /// Running, and at least one event arrived meanwhile
    RunningDirty,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<GroupId>,
    entries: HashMap<GroupId, EntryState>,
    /// Consecutive failures per group, cleared on success
    failures: HashMap<GroupId, u32>,
}

struct Inner {
    state: Mutex<QueueState>,
    notify: Notify,
    backoff_initial: Duration,
    backoff_cap: Duration,
}

/// Work queue of group ids with single-in-flight-per-key discipline.
///
/// Cheap to clone; all clones share the same queue.
#[derive(Clone)]
pub struct GroupQueue {
    inner: Arc<Inner>,
}

impl GroupQueue {
    #[must_use]
    pub fn new(backoff_initial: Duration, backoff_cap: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                backoff_initial,
                backoff_cap,
            }),
        }
    }

    /// Enqueue a group for reconciliation.
    ///
    /// Idempotent while the group is already queued; marks an in-flight
    /// group dirty so it re-runs once.
    pub fn enqueue(&self, group: GroupId) {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match state.entries.get(&group).copied() {
            None => {
                state.entries.insert(group.clone(), EntryState::Queued);
                state.ready.push_back(group);
                metrics::GROUPS_IN_FLIGHT
                    .with_label_values(&["queued"])
                    .inc();
                drop(state);
                self.inner.notify.notify_one();
            }
            Some(EntryState::Queued) => {}
            Some(EntryState::Running) => {
                state.entries.insert(group, EntryState::RunningDirty);
            }
            Some(EntryState::RunningDirty) => {}
        }
    }

    /// Take the next group to reconcile, waiting when the queue is empty.
    pub async fn next(&self) -> GroupId {
        loop {
            {
                let mut state = self
                    .inner
                    .state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if let Some(group) = state.ready.pop_front() {
                    state.entries.insert(group.clone(), EntryState::Running);
                    let more = !state.ready.is_empty();
                    metrics::GROUPS_IN_FLIGHT
                        .with_label_values(&["queued"])
                        .dec();
                    metrics::GROUPS_IN_FLIGHT
                        .with_label_values(&["running"])
                        .inc();
                    drop(state);
                    if more {
                        // Wake a sibling worker for the remaining items
                        self.inner.notify.notify_one();
                    }
                    return group;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// Report a finished reconcile.
    ///
    /// Coalesced events re-enqueue the group immediately; failures
    /// schedule a delayed re-enqueue with exponential backoff.
    pub fn done(&self, group: &GroupId, success: bool) {
        let (dirty, delay) = {
            let mut state = self
                .inner
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let dirty = state.entries.remove(group) == Some(EntryState::RunningDirty);
            metrics::GROUPS_IN_FLIGHT
                .with_label_values(&["running"])
                .dec();

            let delay = if success {
                state.failures.remove(group);
                None
            } else {
                let failures = state.failures.entry(group.clone()).or_insert(0);
                *failures = failures.saturating_add(1);
                Some(self.backoff_for(*failures))
            };
            (dirty, delay)
        };

        if dirty {
            // New events arrived mid-flight; run again without delay
            self.enqueue(group.clone());
            return;
        }

        if let Some(delay) = delay {
            debug!(group = %group, delay = ?delay, "scheduling reconcile retry");
            let queue = self.clone();
            let group = group.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                queue.enqueue(group);
            });
        }
    }

    /// `initial * 2^(failures-1)`, capped.
    fn backoff_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        let multiplier = 2u64.saturating_pow(exponent);
        self.inner
            .backoff_initial
            .saturating_mul(u32::try_from(multiplier.min(u64::from(u32::MAX))).unwrap_or(u32::MAX))
            .min(self.inner.backoff_cap)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
