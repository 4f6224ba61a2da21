//! Check driver — runs one check on its own timer.
//!
//! Each driver is meant to be spawned as its own task, so a hung fetch
//! in one check only delays that check's next tick.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use driftwatch_core::{Alert, CheckKind};

use crate::check::{Check, TickReport};
use crate::emitter::AlertEmitter;

pub struct CheckDriver {
    check: Box<dyn Check>,
    interval: Duration,
    emitter: AlertEmitter,
}

impl std::fmt::Debug for CheckDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckDriver")
            .field("kind", &self.check.kind())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl CheckDriver {
    pub fn new(check: Box<dyn Check>, interval: Duration, emitter: AlertEmitter) -> Self {
        Self {
            check,
            interval,
            emitter,
        }
    }

    pub fn kind(&self) -> CheckKind {
        self.check.kind()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single tick at `now`.
    ///
    /// A failed tick raises a diagnostic alert and returns `None`.
    pub async fn tick_at(&mut self, now: Instant) -> Option<TickReport> {
        let kind = self.check.kind();
        match self.check.tick(now).await {
            Ok(report) => {
                debug!(
                    check = %kind,
                    subjects = report.subjects,
                    active = report.active,
                    alerts = report.alerts.len(),
                    "check tick complete"
                );
                Some(report)
            }
            Err(e) => {
                error!(check = %kind, error = %e, "check tick failed");
                let alert = Alert::new(
                    self.check.diagnostic_title(),
                    format!("Unable to complete {kind} check: {e}"),
                );
                self.emitter.diagnostic(&alert).await;
                None
            }
        }
    }

    /// Tick until shutdown is signalled. The first tick runs immediately.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let kind = self.check.kind();
        info!(check = %kind, interval = ?self.interval, "check driver started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_at(Instant::now()).await;
                }
                _ = shutdown.changed() => {
                    info!(check = %kind, "check driver shutting down");
                    break;
                }
            }
        }
    }
}
