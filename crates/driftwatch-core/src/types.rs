//! Domain types for fleet snapshots.
//!
//! These are the raw inputs the checks evaluate: directory entries,
//! build-registry versions, scheduler job assignments, telemetry metric
//! sets, and gossip friend lists. All types are JSON-serializable so the
//! HTTP adapters can decode them directly.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, FetchResult};

/// Unique identifier for a node in the fleet.
pub type NodeId = String;

/// Telemetry key carrying a node's gossip friend list.
pub const FRIENDS_METRIC: &str = "friends";

/// Telemetry key carrying the time a node became ready to serve.
pub const READY_TIME_METRIC: &str = "ftime";

// ── Checks ────────────────────────────────────────────────────────

/// The kind of condition a check evaluates.
///
/// Forms the first half of every debounce key, so two checks never share
/// tracker state even when they look at the same subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    VersionDrift,
    Cpu,
    ConcurrentBuilds,
    RuntimeVersion,
    FriendCount,
    SplitBrain,
}

impl CheckKind {
    pub const ALL: [CheckKind; 6] = [
        CheckKind::VersionDrift,
        CheckKind::Cpu,
        CheckKind::ConcurrentBuilds,
        CheckKind::RuntimeVersion,
        CheckKind::FriendCount,
        CheckKind::SplitBrain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::VersionDrift => "version_drift",
            CheckKind::Cpu => "cpu",
            CheckKind::ConcurrentBuilds => "concurrent_builds",
            CheckKind::RuntimeVersion => "runtime_version",
            CheckKind::FriendCount => "friend_count",
            CheckKind::SplitBrain => "split_brain",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown check kind: {s}"))
    }
}

// ── Directory ─────────────────────────────────────────────────────

/// A service registration as reported by the directory.
///
/// Used both for fleet membership and for the per-peer registry listings
/// compared by the split-brain check, where every field must match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub identifier: NodeId,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub service_name: String,
}

impl RegistryEntry {
    pub fn new(identifier: &str, address: &str, port: u16, service_name: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            address: address.to_string(),
            port,
            service_name: service_name.to_string(),
        }
    }

    /// `address:port`, the endpoint used to reach this member.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Display for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{} ({})",
            self.identifier, self.address, self.port, self.service_name
        )
    }
}

// ── Builds ────────────────────────────────────────────────────────

/// A version produced by the build registry for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltVersion {
    pub job: String,
    pub version: String,
}

/// A job a worker node has been assigned, with what it is running.
///
/// An empty `running_version` means the job has not reported yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAssignment {
    pub job: String,
    #[serde(default)]
    pub running_version: String,
}

/// Build registry query: one job, or every job at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionQuery {
    pub job: Option<String>,
    pub latest_only: bool,
}

impl VersionQuery {
    /// Latest version of a single job.
    pub fn for_job(job: &str) -> Self {
        Self {
            job: Some(job.to_string()),
            latest_only: true,
        }
    }

    /// Latest version of every job.
    pub fn all_latest() -> Self {
        Self {
            job: None,
            latest_only: true,
        }
    }
}

// ── Telemetry ─────────────────────────────────────────────────────

/// A single telemetry value reported by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    /// Numeric fraction, e.g. CPU load on a 0–100 scale.
    Fraction(f64),
    /// Integer counter, e.g. concurrent builds.
    Count(i64),
    /// Free text, e.g. a runtime version tag.
    Text(String),
    /// Unix timestamp (seconds).
    Timestamp(i64),
    /// List of strings, e.g. gossip peer addresses.
    List(Vec<String>),
}

impl MetricValue {
    /// Numeric view for threshold comparisons.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Fraction(v) => Some(*v),
            MetricValue::Count(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Fraction(v) => write!(f, "{v}"),
            MetricValue::Count(v) => write!(f, "{v}"),
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Timestamp(t) => write!(f, "@{t}"),
            MetricValue::List(items) => write!(f, "[{}]", items.join(" ")),
        }
    }
}

/// All metrics reported by one node, keyed by metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<String, MetricValue>);

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: MetricValue) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: MetricValue) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, MetricValue)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (String, MetricValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ── Gossip ────────────────────────────────────────────────────────

/// Fail with [`FetchError::NotReady`] when the node's ready time is zero.
///
/// A node that has not finished starting up is never an authoritative
/// source for gossip or registry state.
pub fn ensure_ready(target: &str, metrics: &MetricSet) -> FetchResult<()> {
    match metrics.get(READY_TIME_METRIC) {
        Some(MetricValue::Timestamp(0)) | Some(MetricValue::Count(0)) => Err(FetchError::NotReady {
            target: target.to_string(),
        }),
        _ => Ok(()),
    }
}

/// The peers a node currently gossips with, as individual addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FriendList(Vec<String>);

impl FriendList {
    pub fn new(addresses: Vec<String>) -> Self {
        Self(addresses)
    }

    /// Extract a friend list from a node's telemetry. Unready nodes are
    /// rejected first.
    pub fn from_metrics(target: &str, metrics: &MetricSet) -> FetchResult<Self> {
        ensure_ready(target, metrics)?;

        match metrics.get(FRIENDS_METRIC) {
            Some(MetricValue::List(addresses)) => Ok(Self(addresses.clone())),
            Some(other) => Err(FetchError::Malformed {
                target: target.to_string(),
                message: format!("friends metric is not a list: {other}"),
            }),
            None => Err(FetchError::NoFriends {
                target: target.to_string(),
            }),
        }
    }

    pub fn addresses(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FriendList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(" "))
    }
}

// ── Alerts ────────────────────────────────────────────────────────

/// What the debounce tracker does once a condition has outlived its
/// threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    /// Alert on the first qualifying poll, then stay quiet until the
    /// condition clears and is acquired again.
    #[default]
    OncePerEpisode,
    /// Alert on every poll once the threshold has been crossed.
    EveryPoll,
}

/// An alert handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    /// Whether the sink should page someone. Checks leave this unset.
    pub page: bool,
}

impl Alert {
    pub fn new(title: &str, message: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
            page: false,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}
