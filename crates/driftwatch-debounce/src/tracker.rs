//! Debounce tracker — per-key persistence of fault conditions.
//!
//! Each check owns one tracker. Keys are only ever touched from that
//! check's tick, so the map needs no locking.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use driftwatch_core::{AlertPolicy, CheckKind};

/// Identity under which a condition's persistence is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionKey {
    pub kind: CheckKind,
    pub subject: String,
}

impl ConditionKey {
    pub fn new(kind: CheckKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
        }
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subject)
    }
}

/// A currently-active condition.
#[derive(Debug, Clone, Copy)]
struct DebounceEntry {
    /// When the condition was first seen holding in this episode.
    first_seen: Instant,
    /// Whether this episode has already produced an alert.
    alerted: bool,
}

/// Converts per-poll condition samples into alert decisions.
#[derive(Debug, Default)]
pub struct DebounceTracker {
    entries: HashMap<ConditionKey, DebounceEntry>,
    policy: AlertPolicy,
}

impl DebounceTracker {
    /// Create a tracker with the default `OncePerEpisode` policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker with an explicit policy.
    pub fn with_policy(policy: AlertPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    /// Record whether `key`'s condition holds at `now` and decide
    /// whether to alert.
    ///
    /// The first sighting never alerts; the condition has to still hold
    /// on a later poll more than `threshold` after it was first seen.
    pub fn evaluate(
        &mut self,
        key: &ConditionKey,
        holds: bool,
        now: Instant,
        threshold: Duration,
    ) -> bool {
        if !holds {
            if let Some(entry) = self.entries.remove(key) {
                debug!(
                    %key,
                    active_for = ?now.saturating_duration_since(entry.first_seen),
                    "condition cleared"
                );
            }
            return false;
        }

        let Some(entry) = self.entries.get_mut(key) else {
            self.entries.insert(
                key.clone(),
                DebounceEntry {
                    first_seen: now,
                    alerted: false,
                },
            );
            debug!(%key, ?threshold, "condition first seen");
            return false;
        };

        let age = now.saturating_duration_since(entry.first_seen);
        if age <= threshold {
            return false;
        }

        match self.policy {
            AlertPolicy::EveryPoll => true,
            AlertPolicy::OncePerEpisode if entry.alerted => false,
            AlertPolicy::OncePerEpisode => {
                entry.alerted = true;
                info!(%key, ?age, ?threshold, "condition persisted past threshold");
                true
            }
        }
    }

    /// Forget every active key not in `seen`.
    ///
    /// Called at the end of a complete tick, so a subject that leaves the
    /// fleet does not resume an old episode if it comes back later.
    pub fn retain_seen(&mut self, seen: &HashSet<ConditionKey>) {
        self.entries.retain(|key, _| {
            let keep = seen.contains(key);
            if !keep {
                debug!(%key, "subject gone, dropping condition");
            }
            keep
        });
    }

    /// When `key`'s current episode started, if it is active.
    pub fn first_seen(&self, key: &ConditionKey) -> Option<Instant> {
        self.entries.get(key).map(|e| e.first_seen)
    }

    /// Whether `key` is currently active.
    pub fn is_active(&self, key: &ConditionKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of currently-active conditions.
    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }
}
