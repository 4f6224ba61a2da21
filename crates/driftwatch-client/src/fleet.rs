//! HTTP implementation of the fleet capability traits.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::form_urlencoded;

use driftwatch_core::*;

use crate::request::get_json;

/// Per-request timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Talks to the directory, build registry, and every fleet node over
/// HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpFleetClient {
    directory_url: String,
    build_registry_url: String,
    /// `address:port` of the node whose gossip view is audited.
    local_node: Option<String>,
    timeout: Duration,
}

impl HttpFleetClient {
    pub fn new(directory_url: &str, build_registry_url: &str) -> Self {
        Self {
            directory_url: directory_url.trim_end_matches('/').to_string(),
            build_registry_url: build_registry_url.trim_end_matches('/').to_string(),
            local_node: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_local_node(mut self, local_node: &str) -> Self {
        self.local_node = Some(local_node.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn versions_url(&self, query: &VersionQuery) -> String {
        let mut params = form_urlencoded::Serializer::new(String::new());
        params.append_pair("latest", if query.latest_only { "true" } else { "false" });
        if let Some(job) = &query.job {
            params.append_pair("job", job);
        }
        format!("{}/v1/versions?{}", self.build_registry_url, params.finish())
    }

    /// Friend list published by the node at `endpoint` in its telemetry.
    async fn friends_at(&self, endpoint: &str) -> FetchResult<FriendList> {
        let metrics = self.node_metrics(endpoint).await?;
        FriendList::from_metrics(endpoint, &metrics)
    }
}

#[async_trait]
impl Directory for HttpFleetClient {
    async fn list_fleet_members(&self) -> FetchResult<Vec<RegistryEntry>> {
        let url = format!("{}/v1/members", self.directory_url);
        let members: Vec<RegistryEntry> = get_json(&url, self.timeout).await?;
        debug!(count = members.len(), "fetched fleet members");
        Ok(members)
    }

    async fn registry_listing(&self, address: &str) -> FetchResult<Vec<RegistryEntry>> {
        get_json(&format!("http://{address}/v1/registry"), self.timeout).await
    }
}

#[async_trait]
impl BuildRegistry for HttpFleetClient {
    async fn list_built_versions(&self, query: &VersionQuery) -> FetchResult<Vec<BuiltVersion>> {
        get_json(&self.versions_url(query), self.timeout).await
    }
}

#[async_trait]
impl Scheduler for HttpFleetClient {
    async fn list_job_assignments(&self, node: &RegistryEntry) -> FetchResult<Vec<JobAssignment>> {
        get_json(&format!("http://{}/v1/jobs", node.endpoint()), self.timeout).await
    }
}

#[async_trait]
impl Telemetry for HttpFleetClient {
    async fn node_metrics(&self, endpoint: &str) -> FetchResult<MetricSet> {
        get_json(&format!("http://{endpoint}/v1/state"), self.timeout).await
    }
}

#[async_trait]
impl Gossip for HttpFleetClient {
    async fn friend_list(&self) -> FetchResult<FriendList> {
        match &self.local_node {
            Some(local) => self.friends_at(local).await,
            None => Err(FetchError::transport("gossip", "no local node configured")),
        }
    }

    async fn remote_friend_list(&self, address: &str) -> FetchResult<FriendList> {
        self.friends_at(address).await
    }

    async fn peer_ready(&self, address: &str) -> FetchResult<()> {
        let metrics = self.node_metrics(address).await?;
        ensure_ready(address, &metrics)
    }
}
