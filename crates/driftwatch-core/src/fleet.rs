//! Capability traits for the fleet collaborators.
//!
//! Each external service the watchdog talks to is one trait. The daemon
//! wires in the HTTP implementations from `driftwatch-client`; tests
//! substitute deterministic fakes.

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::types::{
    Alert, BuiltVersion, FriendList, JobAssignment, MetricSet, RegistryEntry, VersionQuery,
};

/// Fleet membership and per-peer registry listings.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Every service currently registered in the fleet.
    async fn list_fleet_members(&self) -> FetchResult<Vec<RegistryEntry>>;

    /// The full registry listing as held by the peer at `address`.
    async fn registry_listing(&self, address: &str) -> FetchResult<Vec<RegistryEntry>>;
}

/// Versions produced by the build registry.
#[async_trait]
pub trait BuildRegistry: Send + Sync {
    async fn list_built_versions(&self, query: &VersionQuery) -> FetchResult<Vec<BuiltVersion>>;
}

/// Job assignments reported by a worker node.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn list_job_assignments(&self, node: &RegistryEntry) -> FetchResult<Vec<JobAssignment>>;
}

/// Per-node health metrics.
#[async_trait]
pub trait Telemetry: Send + Sync {
    /// Metrics reported by the node reachable at `endpoint` (`address:port`).
    async fn node_metrics(&self, endpoint: &str) -> FetchResult<MetricSet>;
}

/// Gossip membership as seen by this node and by its friends.
#[async_trait]
pub trait Gossip: Send + Sync {
    /// The local node's friend list.
    async fn friend_list(&self) -> FetchResult<FriendList>;

    /// The friend list reported by the peer at `address`.
    async fn remote_friend_list(&self, address: &str) -> FetchResult<FriendList>;

    /// `Ok` once the peer at `address` reports a non-zero ready time,
    /// [`FetchError::NotReady`](crate::FetchError::NotReady) before that.
    async fn peer_ready(&self, address: &str) -> FetchResult<()>;
}

/// Delivery of alerts. The watchdog only decides whether and when.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn raise_alert(&self, alert: &Alert) -> anyhow::Result<()>;
}
