//! Turns a validated `WatchConfig` into running check drivers.
//!
//! Config fields are all optional; every default lives here or with the
//! check's own settings constructor.

use std::sync::Arc;
use std::time::Duration;

use driftwatch_checks::{
    AlertEmitter, CategoricalCheck, CategoricalSettings, CheckDriver, FriendCountCheck,
    SplitBrainCheck, ThresholdCheck, ThresholdPolicy, ThresholdSettings, VersionDriftCheck,
    VersionDriftSettings,
};
use driftwatch_client::{DEFAULT_TIMEOUT, HttpFleetClient, LogSink, WebhookSink};
use driftwatch_core::config::{ThresholdCheckConfig, interval, optional_duration};
use driftwatch_core::{AlertSink, CheckKind, ConfigError, WatchConfig};
use driftwatch_debounce::DebounceTracker;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

const DEFAULT_WORKER_SERVICE: &str = "build-worker";

pub fn fleet_client(config: &WatchConfig) -> Result<HttpFleetClient, ConfigError> {
    let timeout = config.request_timeout()?.unwrap_or(DEFAULT_TIMEOUT);
    let mut client = HttpFleetClient::new(&config.fleet.directory_url, &config.fleet.build_registry_url)
        .with_timeout(timeout);
    if let Some(local) = &config.fleet.local_node {
        client = client.with_local_node(local);
    }
    Ok(client)
}

/// Webhook when configured, the log otherwise.
pub fn alert_sink(config: &WatchConfig, timeout: Duration) -> Arc<dyn AlertSink> {
    match &config.alerts.webhook_url {
        Some(url) => Arc::new(WebhookSink::new(url).with_timeout(timeout)),
        None => Arc::new(LogSink),
    }
}

/// One driver per enabled check, in a fixed order.
pub fn build_drivers(
    config: &WatchConfig,
    client: Arc<HttpFleetClient>,
    emitter: &AlertEmitter,
) -> Result<Vec<CheckDriver>, ConfigError> {
    let policy = config.alerts.policy;
    let checks = &config.checks;
    let worker_service = config
        .fleet
        .worker_service
        .as_deref()
        .unwrap_or(DEFAULT_WORKER_SERVICE);
    let mut drivers = Vec::new();

    // ── Version drift ──
    let raw = &checks.version_drift;
    if raw.enabled.unwrap_or(true) {
        let mut settings = VersionDriftSettings {
            worker_service: worker_service.to_string(),
            ..Default::default()
        };
        if let Some(threshold) =
            optional_duration("checks.version_drift.threshold", raw.threshold.as_deref())?
        {
            settings.threshold = threshold;
        }
        if let Some(query) = raw.query {
            settings.query = query;
        }
        let check = VersionDriftCheck::new(
            client.clone(),
            client.clone(),
            client.clone(),
            emitter.clone(),
            DebounceTracker::with_policy(policy),
            settings,
        );
        let every = interval_or("checks.version_drift.interval", raw.interval.as_deref(), HOUR)?;
        drivers.push(CheckDriver::new(Box::new(check), every, emitter.clone()));
    }

    // ── Resource thresholds ──
    let raw = &checks.cpu;
    if raw.enabled.unwrap_or(true) {
        let mut settings = ThresholdSettings::cpu(worker_service);
        apply_threshold(&mut settings, raw, "checks.cpu")?;
        let check = ThresholdCheck::new(
            client.clone(),
            client.clone(),
            emitter.clone(),
            DebounceTracker::with_policy(policy),
            settings,
        );
        let every = interval_or("checks.cpu.interval", raw.interval.as_deref(), 5 * MINUTE)?;
        drivers.push(CheckDriver::new(Box::new(check), every, emitter.clone()));
    }

    let raw = &checks.concurrent_builds;
    if raw.enabled.unwrap_or(false) {
        let mut settings = ThresholdSettings::concurrent_builds();
        apply_threshold(&mut settings, raw, "checks.concurrent_builds")?;
        let check = ThresholdCheck::new(
            client.clone(),
            client.clone(),
            emitter.clone(),
            DebounceTracker::with_policy(policy),
            settings,
        );
        let every = interval_or("checks.concurrent_builds.interval", raw.interval.as_deref(), MINUTE)?;
        drivers.push(CheckDriver::new(Box::new(check), every, emitter.clone()));
    }

    // ── Runtime version ──
    let raw = &checks.runtime_version;
    if raw.enabled.unwrap_or(raw.expected.is_some()) {
        let expected = raw.expected.as_deref().ok_or_else(|| {
            ConfigError::Invalid("checks.runtime_version is enabled but has no `expected` value".to_string())
        })?;
        let mut settings = CategoricalSettings::runtime_version(
            raw.service.as_deref().unwrap_or(worker_service),
            expected,
        );
        if let Some(metric) = &raw.metric {
            settings.metric = metric.clone();
        }
        let check = CategoricalCheck::new(client.clone(), client.clone(), emitter.clone(), settings);
        let every = interval_or("checks.runtime_version.interval", raw.interval.as_deref(), HOUR)?;
        drivers.push(CheckDriver::new(Box::new(check), every, emitter.clone()));
    }

    // ── Gossip peers ──
    let peers_default = config.peer_checks_default();
    let raw = &checks.friend_count;
    if raw.enabled.unwrap_or(peers_default) {
        let local = local_node(config)?;
        let check = FriendCountCheck::new(client.clone(), emitter.clone(), local);
        let every = interval_or("checks.friend_count.interval", raw.interval.as_deref(), 5 * MINUTE)?;
        drivers.push(CheckDriver::new(Box::new(check), every, emitter.clone()));
    }

    let raw = &checks.split_brain;
    if raw.enabled.unwrap_or(peers_default) {
        local_node(config)?;
        let check = SplitBrainCheck::new(client.clone(), client.clone(), emitter.clone());
        let every = interval_or("checks.split_brain.interval", raw.interval.as_deref(), 5 * MINUTE)?;
        drivers.push(CheckDriver::new(Box::new(check), every, emitter.clone()));
    }

    Ok(drivers)
}

/// Keep only the driver for `only`, if given. Asking for a check that is
/// not enabled is an error rather than an empty run.
pub fn select_drivers(
    drivers: Vec<CheckDriver>,
    only: Option<CheckKind>,
) -> Result<Vec<CheckDriver>, ConfigError> {
    let Some(kind) = only else {
        return Ok(drivers);
    };
    let selected: Vec<CheckDriver> = drivers.into_iter().filter(|d| d.kind() == kind).collect();
    if selected.is_empty() {
        return Err(ConfigError::Invalid(format!("check {kind} is not enabled")));
    }
    Ok(selected)
}

fn interval_or(field: &str, value: Option<&str>, default: Duration) -> Result<Duration, ConfigError> {
    Ok(interval(field, value)?.unwrap_or(default))
}

fn local_node(config: &WatchConfig) -> Result<&str, ConfigError> {
    config
        .fleet
        .local_node
        .as_deref()
        .ok_or_else(|| ConfigError::Invalid("peer checks need fleet.local_node".to_string()))
}

/// Overlay configured values on a check's defaults. Setting a window
/// always debounces, even for checks that alert immediately by default.
fn apply_threshold(
    settings: &mut ThresholdSettings,
    raw: &ThresholdCheckConfig,
    section: &str,
) -> Result<(), ConfigError> {
    if let Some(service) = &raw.service {
        settings.service = service.clone();
    }
    if let Some(metric) = &raw.metric {
        settings.metric = metric.clone();
    }
    if let Some(limit) = raw.limit {
        settings.limit = limit;
    }
    if let Some(window) = optional_duration(&format!("{section}.window"), raw.window.as_deref())? {
        settings.policy = ThresholdPolicy::Debounced { window };
    }
    Ok(())
}
