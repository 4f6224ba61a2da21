//! Alert emitter — the only path to the alert sink.
//!
//! Counters are atomics shared between every check's emitter clone, so
//! the daemon can report totals without touching check state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use driftwatch_core::{Alert, AlertSink};

/// Process-lifetime alert totals.
#[derive(Debug, Clone, Default)]
pub struct AlertCounter {
    /// Alerts about fleet conditions.
    raised: Arc<AtomicU64>,
    /// Alerts about a checker failing to run.
    diagnostics: Arc<AtomicU64>,
}

impl AlertCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raised(&self) -> u64 {
        self.raised.load(Ordering::Relaxed)
    }

    pub fn diagnostics(&self) -> u64 {
        self.diagnostics.load(Ordering::Relaxed)
    }
}

/// Hands alerts to the sink and counts them.
///
/// Sink failures are logged and dropped; the next qualifying poll is the
/// only retry.
#[derive(Clone)]
pub struct AlertEmitter {
    sink: Arc<dyn AlertSink>,
    counter: AlertCounter,
}

impl AlertEmitter {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self {
            sink,
            counter: AlertCounter::new(),
        }
    }

    /// Share an existing counter across emitters.
    pub fn with_counter(sink: Arc<dyn AlertSink>, counter: AlertCounter) -> Self {
        Self { sink, counter }
    }

    /// Raise an alert about fleet state.
    pub async fn emit(&self, alert: &Alert) {
        self.counter.raised.fetch_add(1, Ordering::Relaxed);
        info!(title = %alert.title, page = alert.page, message = %alert.message, "raising alert");
        self.deliver(alert).await;
    }

    /// Raise an alert about the watchdog itself.
    pub async fn diagnostic(&self, alert: &Alert) {
        self.counter.diagnostics.fetch_add(1, Ordering::Relaxed);
        self.deliver(alert).await;
    }

    pub fn counter(&self) -> &AlertCounter {
        &self.counter
    }

    async fn deliver(&self, alert: &Alert) {
        if let Err(e) = self.sink.raise_alert(alert).await {
            warn!(title = %alert.title, error = %e, "alert sink rejected alert");
        }
    }
}
