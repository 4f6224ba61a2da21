//! Resource threshold checks (CPU load, build concurrency).
//!
//! Reads a numeric metric from every member of a service and compares it
//! against a fixed limit. Build concurrency is actionable the moment it
//! is breached; CPU spikes are debounced so a single busy poll is quiet.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use driftwatch_core::*;
use driftwatch_debounce::{ConditionKey, DebounceTracker};

use crate::check::{Check, TickReport};
use crate::emitter::AlertEmitter;

/// When a breach turns into an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdPolicy {
    /// Every breaching poll alerts.
    Immediate,
    /// The breach must persist longer than `window`.
    Debounced { window: Duration },
}

#[derive(Debug, Clone)]
pub struct ThresholdSettings {
    pub kind: CheckKind,
    pub title: String,
    /// Service name whose members are checked.
    pub service: String,
    pub metric: String,
    /// Values strictly above this breach.
    pub limit: f64,
    pub policy: ThresholdPolicy,
}

impl ThresholdSettings {
    /// CPU load above 80 on worker nodes, debounced for ten minutes.
    pub fn cpu(service: &str) -> Self {
        Self {
            kind: CheckKind::Cpu,
            title: "High CPU".to_string(),
            service: service.to_string(),
            metric: "cpu".to_string(),
            limit: 80.0,
            policy: ThresholdPolicy::Debounced {
                window: Duration::from_secs(10 * 60),
            },
        }
    }

    /// More than four concurrent builds on the build registry.
    pub fn concurrent_builds() -> Self {
        Self {
            kind: CheckKind::ConcurrentBuilds,
            title: "ConcurrentBuilds".to_string(),
            service: "build-registry".to_string(),
            metric: "concurrent_builds".to_string(),
            limit: 4.0,
            policy: ThresholdPolicy::Immediate,
        }
    }
}

/// The metric's value if it is present, numeric, and above `limit`.
///
/// A missing metric never counts as a breach.
pub fn breach(metrics: &MetricSet, metric: &str, limit: f64) -> Option<f64> {
    metrics
        .get(metric)
        .and_then(MetricValue::as_number)
        .filter(|value| *value > limit)
}

pub struct ThresholdCheck {
    directory: Arc<dyn Directory>,
    telemetry: Arc<dyn Telemetry>,
    emitter: AlertEmitter,
    tracker: DebounceTracker,
    settings: ThresholdSettings,
}

impl ThresholdCheck {
    pub fn new(
        directory: Arc<dyn Directory>,
        telemetry: Arc<dyn Telemetry>,
        emitter: AlertEmitter,
        tracker: DebounceTracker,
        settings: ThresholdSettings,
    ) -> Self {
        Self {
            directory,
            telemetry,
            emitter,
            tracker,
            settings,
        }
    }

    pub fn tracker(&self) -> &DebounceTracker {
        &self.tracker
    }

    fn alert(&self, node: &RegistryEntry, value: f64) -> Alert {
        Alert::new(
            &self.settings.title,
            format!(
                "{} is reporting {} = {} (limit {})",
                node.identifier, self.settings.metric, value, self.settings.limit
            ),
        )
    }
}

#[async_trait]
impl Check for ThresholdCheck {
    fn kind(&self) -> CheckKind {
        self.settings.kind
    }

    fn diagnostic_title(&self) -> &'static str {
        "Threshold Checker"
    }

    async fn tick(&mut self, now: Instant) -> CheckResult<TickReport> {
        let mut report = TickReport::new(self.settings.kind);
        let members = self.directory.list_fleet_members().await?;
        let mut seen = HashSet::new();

        for node in members
            .iter()
            .filter(|m| m.service_name == self.settings.service)
        {
            report.subjects += 1;
            let metrics = self.telemetry.node_metrics(&node.endpoint()).await?;
            let value = breach(&metrics, &self.settings.metric, self.settings.limit);
            if let Some(v) = value {
                debug!(node = %node.identifier, metric = %self.settings.metric, value = v, "threshold breached");
            }

            let should_alert = match self.settings.policy {
                ThresholdPolicy::Immediate => value.is_some(),
                ThresholdPolicy::Debounced { window } => {
                    let key = ConditionKey::new(self.settings.kind, node.identifier.clone());
                    let alert = self.tracker.evaluate(&key, value.is_some(), now, window);
                    seen.insert(key);
                    alert
                }
            };

            if should_alert && let Some(v) = value {
                let alert = self.alert(node, v);
                self.emitter.emit(&alert).await;
                report.alerts.push(alert);
            }
        }

        self.tracker.retain_seen(&seen);
        report.active = self.tracker.active_count();
        Ok(report)
    }
}
