//! The interface every fleet check implements.

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;

use driftwatch_core::{Alert, CheckKind, CheckResult};

/// A periodically evaluated fleet check.
///
/// `tick` takes `&mut self`, so a check's debounce state is never read or
/// written by two ticks at once.
#[async_trait]
pub trait Check: Send {
    fn kind(&self) -> CheckKind;

    /// Title used for diagnostic alerts when a tick fails.
    fn diagnostic_title(&self) -> &'static str;

    /// Run one poll. `now` is the timestamp fed to the debounce tracker.
    async fn tick(&mut self, now: Instant) -> CheckResult<TickReport>;
}

/// What a single tick saw and did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub kind: CheckKind,
    /// Subjects evaluated (node/job pairs, nodes, or peers).
    pub subjects: usize,
    /// Debounced conditions still active after this tick.
    pub active: usize,
    /// Alerts raised during this tick.
    pub alerts: Vec<Alert>,
}

impl TickReport {
    pub fn new(kind: CheckKind) -> Self {
        Self {
            kind,
            subjects: 0,
            active: 0,
            alerts: Vec::new(),
        }
    }

    pub fn alerted(&self) -> bool {
        !self.alerts.is_empty()
    }
}
