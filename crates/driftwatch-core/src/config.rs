//! driftwatch.toml configuration parser.
//!
//! Every check section is optional and every field inside it is optional;
//! defaults live with the checks themselves. This module only parses and
//! validates the raw values.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::ConfigError;
use crate::types::AlertPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub fleet: FleetConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub checks: ChecksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Base URL of the directory service (e.g. `http://10.0.0.1:50055`).
    pub directory_url: String,
    /// Base URL of the build registry.
    pub build_registry_url: String,
    /// `address:port` of the node whose gossip view we audit.
    pub local_node: Option<String>,
    /// Service name identifying worker nodes in the directory.
    pub worker_service: Option<String>,
    /// Per-request timeout (e.g. "5s").
    pub request_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub policy: AlertPolicy,
    /// Webhook receiving alerts as JSON. Alerts are only logged when unset.
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecksConfig {
    #[serde(default)]
    pub version_drift: VersionDriftConfig,
    #[serde(default)]
    pub cpu: ThresholdCheckConfig,
    #[serde(default)]
    pub concurrent_builds: ThresholdCheckConfig,
    #[serde(default)]
    pub runtime_version: CategoricalCheckConfig,
    #[serde(default)]
    pub friend_count: PeerCheckConfig,
    #[serde(default)]
    pub split_brain: PeerCheckConfig,
}

/// How the version check queries the build registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionQueryMode {
    /// One registry call per job assignment.
    #[default]
    PerJob,
    /// One registry call per tick for every job.
    Batch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionDriftConfig {
    pub enabled: Option<bool>,
    pub interval: Option<String>,
    pub threshold: Option<String>,
    pub query: Option<VersionQueryMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdCheckConfig {
    pub enabled: Option<bool>,
    pub interval: Option<String>,
    /// Service name whose members are checked.
    pub service: Option<String>,
    pub metric: Option<String>,
    pub limit: Option<f64>,
    /// Debounce window; unset keeps the check's own default.
    pub window: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoricalCheckConfig {
    pub enabled: Option<bool>,
    pub interval: Option<String>,
    pub service: Option<String>,
    pub metric: Option<String>,
    pub expected: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerCheckConfig {
    pub enabled: Option<bool>,
    pub interval: Option<String>,
}

impl WatchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    /// Parse and validate a config document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: WatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values that would only fail once the daemon is running.
    pub fn validate(&self) -> Result<(), ConfigError> {
        optional_duration("fleet.request_timeout", self.fleet.request_timeout.as_deref())?;

        let checks = &self.checks;
        interval("checks.version_drift.interval", checks.version_drift.interval.as_deref())?;
        optional_duration(
            "checks.version_drift.threshold",
            checks.version_drift.threshold.as_deref(),
        )?;
        interval("checks.cpu.interval", checks.cpu.interval.as_deref())?;
        optional_duration("checks.cpu.window", checks.cpu.window.as_deref())?;
        interval(
            "checks.concurrent_builds.interval",
            checks.concurrent_builds.interval.as_deref(),
        )?;
        optional_duration(
            "checks.concurrent_builds.window",
            checks.concurrent_builds.window.as_deref(),
        )?;
        interval(
            "checks.runtime_version.interval",
            checks.runtime_version.interval.as_deref(),
        )?;
        interval("checks.friend_count.interval", checks.friend_count.interval.as_deref())?;
        interval("checks.split_brain.interval", checks.split_brain.interval.as_deref())?;

        if checks.runtime_version.enabled == Some(true) && checks.runtime_version.expected.is_none()
        {
            return Err(ConfigError::Invalid(
                "checks.runtime_version is enabled but has no `expected` value".to_string(),
            ));
        }

        let peer_checks_forced =
            checks.friend_count.enabled == Some(true) || checks.split_brain.enabled == Some(true);
        if peer_checks_forced && self.fleet.local_node.is_none() {
            return Err(ConfigError::Invalid(
                "peer checks are enabled but fleet.local_node is not set".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        optional_duration("fleet.request_timeout", self.fleet.request_timeout.as_deref())
    }

    /// Peer checks default to on whenever there is a local node to audit.
    pub fn peer_checks_default(&self) -> bool {
        self.fleet.local_node.is_some()
    }
}

/// Parse an optional duration field, naming the field on failure.
pub fn optional_duration(field: &str, value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    match value {
        None => Ok(None),
        Some(raw) => parse_duration(raw)
            .map(Some)
            .ok_or_else(|| ConfigError::Duration {
                field: field.to_string(),
                value: raw.to_string(),
            }),
    }
}

/// Like [`optional_duration`], but a zero interval is rejected too.
pub fn interval(field: &str, value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    let parsed = optional_duration(field, value)?;
    if parsed == Some(Duration::ZERO) {
        return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
    }
    Ok(parsed)
}
