//! Deterministic in-memory fleet for check tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use driftwatch_core::*;

/// Key under which the local node's friend list is stored.
pub const LOCAL: &str = "local";

/// A whole fleet behind every capability trait.
#[derive(Default)]
pub struct FakeFleet {
    members: Mutex<Vec<RegistryEntry>>,
    /// job → built versions, newest first.
    versions: Mutex<HashMap<String, Vec<String>>>,
    /// node identifier → assignments.
    jobs: Mutex<HashMap<String, Vec<JobAssignment>>>,
    /// endpoint → metrics.
    metrics: Mutex<HashMap<String, MetricSet>>,
    /// address (or [`LOCAL`]) → friend list.
    friends: Mutex<HashMap<String, FriendList>>,
    /// address → registry listing.
    listings: Mutex<HashMap<String, Vec<RegistryEntry>>>,
    not_ready: Mutex<HashSet<String>>,
    /// Operation names that fail with a transport error.
    failing: Mutex<HashSet<&'static str>>,
    pub registry_calls: AtomicUsize,
}

impl FakeFleet {
    pub fn add_member(&self, entry: RegistryEntry) {
        self.members.lock().unwrap().push(entry);
    }

    pub fn remove_member(&self, identifier: &str) {
        self.members
            .lock()
            .unwrap()
            .retain(|m| m.identifier != identifier);
    }

    pub fn set_built(&self, job: &str, versions: &[&str]) {
        self.versions.lock().unwrap().insert(
            job.to_string(),
            versions.iter().map(|v| v.to_string()).collect(),
        );
    }

    pub fn set_jobs(&self, node: &str, jobs: &[(&str, &str)]) {
        self.jobs.lock().unwrap().insert(
            node.to_string(),
            jobs.iter()
                .map(|(job, running)| JobAssignment {
                    job: job.to_string(),
                    running_version: running.to_string(),
                })
                .collect(),
        );
    }

    pub fn set_metrics(&self, endpoint: &str, metrics: MetricSet) {
        self.metrics
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), metrics);
    }

    pub fn set_friends(&self, address: &str, friends: &[&str]) {
        self.friends.lock().unwrap().insert(
            address.to_string(),
            FriendList::new(friends.iter().map(|f| f.to_string()).collect()),
        );
    }

    pub fn set_listing(&self, address: &str, listing: Vec<RegistryEntry>) {
        self.listings
            .lock()
            .unwrap()
            .insert(address.to_string(), listing);
    }

    pub fn mark_not_ready(&self, address: &str) {
        self.not_ready.lock().unwrap().insert(address.to_string());
    }

    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    fn check_failure(&self, op: &'static str, target: &str) -> FetchResult<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(FetchError::transport(target, "built to fail"));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for FakeFleet {
    async fn list_fleet_members(&self) -> FetchResult<Vec<RegistryEntry>> {
        self.check_failure("members", "directory")?;
        Ok(self.members.lock().unwrap().clone())
    }

    async fn registry_listing(&self, address: &str) -> FetchResult<Vec<RegistryEntry>> {
        self.check_failure("listing", address)?;
        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl BuildRegistry for FakeFleet {
    async fn list_built_versions(&self, query: &VersionQuery) -> FetchResult<Vec<BuiltVersion>> {
        self.check_failure("versions", "build-registry")?;
        self.registry_calls.fetch_add(1, Ordering::SeqCst);
        let versions = self.versions.lock().unwrap();
        let built = versions
            .iter()
            .filter(|(job, _)| query.job.as_deref().is_none_or(|q| q == job.as_str()))
            .flat_map(|(job, versions)| {
                let take = if query.latest_only { 1 } else { versions.len() };
                versions.iter().take(take).map(move |v| BuiltVersion {
                    job: job.clone(),
                    version: v.clone(),
                })
            })
            .collect();
        Ok(built)
    }
}

#[async_trait]
impl Scheduler for FakeFleet {
    async fn list_job_assignments(&self, node: &RegistryEntry) -> FetchResult<Vec<JobAssignment>> {
        self.check_failure("jobs", &node.identifier)?;
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .get(&node.identifier)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl Telemetry for FakeFleet {
    async fn node_metrics(&self, endpoint: &str) -> FetchResult<MetricSet> {
        self.check_failure("metrics", endpoint)?;
        Ok(self
            .metrics
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or_default())
    }
}

impl FakeFleet {
    fn friends_of(&self, address: &str) -> FetchResult<FriendList> {
        if self.not_ready.lock().unwrap().contains(address) {
            return Err(FetchError::NotReady {
                target: address.to_string(),
            });
        }
        self.friends
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| FetchError::NoFriends {
                target: address.to_string(),
            })
    }
}

#[async_trait]
impl Gossip for FakeFleet {
    async fn friend_list(&self) -> FetchResult<FriendList> {
        self.check_failure("friends", LOCAL)?;
        self.friends_of(LOCAL)
    }

    async fn remote_friend_list(&self, address: &str) -> FetchResult<FriendList> {
        self.check_failure("remote_friends", address)?;
        self.friends_of(address)
    }

    async fn peer_ready(&self, address: &str) -> FetchResult<()> {
        self.check_failure("ready", address)?;
        if self.not_ready.lock().unwrap().contains(address) {
            return Err(FetchError::NotReady {
                target: address.to_string(),
            });
        }
        Ok(())
    }
}

/// Sink that records every alert it receives.
#[derive(Default)]
pub struct RecordingSink {
    alerts: Mutex<Vec<Alert>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.alerts().into_iter().map(|a| a.title).collect()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn raise_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sink unavailable");
        }
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}
