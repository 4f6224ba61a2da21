//! Required categorical value check (e.g. runtime version tag).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use driftwatch_core::*;

use crate::check::{Check, TickReport};
use crate::emitter::AlertEmitter;

#[derive(Debug, Clone)]
pub struct CategoricalSettings {
    pub service: String,
    pub metric: String,
    pub expected: String,
}

impl CategoricalSettings {
    pub fn runtime_version(service: &str, expected: &str) -> Self {
        Self {
            service: service.to_string(),
            metric: "runtime_version".to_string(),
            expected: expected.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoricalVerdict {
    Matches,
    WrongValue(String),
    NotReporting,
}

/// Presence is checked first, so a node is never both wrong and missing.
pub fn evaluate_categorical(metrics: &MetricSet, metric: &str, expected: &str) -> CategoricalVerdict {
    match metrics.get(metric) {
        None => CategoricalVerdict::NotReporting,
        Some(value) if value.as_text() == Some(expected) => CategoricalVerdict::Matches,
        Some(value) => CategoricalVerdict::WrongValue(value.to_string()),
    }
}

pub struct CategoricalCheck {
    directory: Arc<dyn Directory>,
    telemetry: Arc<dyn Telemetry>,
    emitter: AlertEmitter,
    settings: CategoricalSettings,
}

impl CategoricalCheck {
    pub fn new(
        directory: Arc<dyn Directory>,
        telemetry: Arc<dyn Telemetry>,
        emitter: AlertEmitter,
        settings: CategoricalSettings,
    ) -> Self {
        Self {
            directory,
            telemetry,
            emitter,
            settings,
        }
    }
}

#[async_trait]
impl Check for CategoricalCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::RuntimeVersion
    }

    fn diagnostic_title(&self) -> &'static str {
        "Version Tag Checker"
    }

    async fn tick(&mut self, _now: Instant) -> CheckResult<TickReport> {
        let mut report = TickReport::new(CheckKind::RuntimeVersion);
        let members = self.directory.list_fleet_members().await?;

        for node in members
            .iter()
            .filter(|m| m.service_name == self.settings.service)
        {
            report.subjects += 1;
            let metrics = self.telemetry.node_metrics(&node.endpoint()).await?;
            let alert = match evaluate_categorical(&metrics, &self.settings.metric, &self.settings.expected) {
                CategoricalVerdict::Matches => continue,
                CategoricalVerdict::WrongValue(value) => Alert::new(
                    "Bad Version",
                    format!(
                        "{} ({}) is on the wrong {}, expected {}",
                        node.identifier, value, self.settings.metric, self.settings.expected
                    ),
                ),
                CategoricalVerdict::NotReporting => Alert::new(
                    "No Version",
                    format!("{} is not reporting {}", node.identifier, self.settings.metric),
                ),
            };
            self.emitter.emit(&alert).await;
            report.alerts.push(alert);
        }

        Ok(report)
    }
}
