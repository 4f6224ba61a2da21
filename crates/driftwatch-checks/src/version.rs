//! Version drift check.
//!
//! Joins what each worker is running against what the build registry
//! last built. A job with nothing built alerts immediately; a worker
//! running the wrong version only alerts once the mismatch has outlived
//! the threshold, so in-flight deploys stay quiet.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use driftwatch_core::config::VersionQueryMode;
use driftwatch_core::*;
use driftwatch_debounce::{ConditionKey, DebounceTracker};

use crate::check::{Check, TickReport};
use crate::emitter::AlertEmitter;

#[derive(Debug, Clone)]
pub struct VersionDriftSettings {
    /// Directory service name identifying worker nodes.
    pub worker_service: String,
    /// How long a mismatch must persist before alerting.
    pub threshold: Duration,
    pub query: VersionQueryMode,
}

impl Default for VersionDriftSettings {
    fn default() -> Self {
        Self {
            worker_service: "build-worker".to_string(),
            threshold: Duration::from_secs(20 * 60),
            query: VersionQueryMode::PerJob,
        }
    }
}

/// Outcome of comparing one job assignment against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionVerdict {
    /// The registry has never built this job.
    NeverBuilt,
    /// The worker has not reported a running version yet.
    NotReporting,
    Matches,
    Drifted { running: String, built: String },
}

/// Compare a running version with the latest built one.
pub fn evaluate_version(running: &str, built: Option<&str>) -> VersionVerdict {
    match built {
        None => VersionVerdict::NeverBuilt,
        Some(_) if running.is_empty() => VersionVerdict::NotReporting,
        Some(built) if built == running => VersionVerdict::Matches,
        Some(built) => VersionVerdict::Drifted {
            running: running.to_string(),
            built: built.to_string(),
        },
    }
}

pub struct VersionDriftCheck {
    directory: Arc<dyn Directory>,
    registry: Arc<dyn BuildRegistry>,
    scheduler: Arc<dyn Scheduler>,
    emitter: AlertEmitter,
    tracker: DebounceTracker,
    settings: VersionDriftSettings,
}

impl VersionDriftCheck {
    pub fn new(
        directory: Arc<dyn Directory>,
        registry: Arc<dyn BuildRegistry>,
        scheduler: Arc<dyn Scheduler>,
        emitter: AlertEmitter,
        tracker: DebounceTracker,
        settings: VersionDriftSettings,
    ) -> Self {
        Self {
            directory,
            registry,
            scheduler,
            emitter,
            tracker,
            settings,
        }
    }

    pub fn tracker(&self) -> &DebounceTracker {
        &self.tracker
    }

    /// Latest built version of `job`, via whichever query mode is set.
    ///
    /// Batch mode fills `batch` on first use and reuses it for the rest
    /// of the tick.
    async fn latest_built(
        &self,
        job: &str,
        batch: &mut Option<HashMap<String, String>>,
    ) -> FetchResult<Option<String>> {
        match self.settings.query {
            VersionQueryMode::PerJob => {
                let versions = self
                    .registry
                    .list_built_versions(&VersionQuery::for_job(job))
                    .await?;
                Ok(versions.into_iter().next().map(|v| v.version))
            }
            VersionQueryMode::Batch => {
                if batch.is_none() {
                    let versions = self
                        .registry
                        .list_built_versions(&VersionQuery::all_latest())
                        .await?;
                    let mut latest = HashMap::new();
                    for v in versions {
                        latest.entry(v.job).or_insert(v.version);
                    }
                    *batch = Some(latest);
                }
                Ok(batch.as_ref().and_then(|b| b.get(job).cloned()))
            }
        }
    }
}

#[async_trait]
impl Check for VersionDriftCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::VersionDrift
    }

    fn diagnostic_title(&self) -> &'static str {
        "Version Checker"
    }

    async fn tick(&mut self, now: Instant) -> CheckResult<TickReport> {
        let mut report = TickReport::new(CheckKind::VersionDrift);
        let members = self.directory.list_fleet_members().await?;
        let mut batch = None;
        let mut seen = HashSet::new();

        for node in members
            .iter()
            .filter(|m| m.service_name == self.settings.worker_service)
        {
            let jobs = self.scheduler.list_job_assignments(node).await?;
            for assignment in &jobs {
                report.subjects += 1;
                let built = self.latest_built(&assignment.job, &mut batch).await?;
                let key = ConditionKey::new(
                    CheckKind::VersionDrift,
                    format!("{}/{}", node.identifier, assignment.job),
                );

                seen.insert(key.clone());

                match evaluate_version(&assignment.running_version, built.as_deref()) {
                    VersionVerdict::NeverBuilt => {
                        let alert = Alert::new(
                            "Version Problem",
                            format!("{} has no version built", assignment.job),
                        );
                        self.emitter.emit(&alert).await;
                        report.alerts.push(alert);
                    }
                    VersionVerdict::NotReporting | VersionVerdict::Matches => {
                        self.tracker
                            .evaluate(&key, false, now, self.settings.threshold);
                    }
                    VersionVerdict::Drifted { running, built } => {
                        debug!(node = %node.identifier, job = %assignment.job, %running, %built, "version mismatch");
                        if self
                            .tracker
                            .evaluate(&key, true, now, self.settings.threshold)
                        {
                            let alert = Alert::new(
                                "Version Drift",
                                format!(
                                    "{} has been running {} at {} instead of {} for over {:?}",
                                    node.identifier,
                                    assignment.job,
                                    running,
                                    built,
                                    self.settings.threshold
                                ),
                            );
                            self.emitter.emit(&alert).await;
                            report.alerts.push(alert);
                        }
                    }
                }
            }
        }

        self.tracker.retain_seen(&seen);
        report.active = self.tracker.active_count();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use driftwatch_core::AlertPolicy;

    use crate::fakes::{FakeFleet, RecordingSink};

    const MIN: Duration = Duration::from_secs(60);

    fn fleet() -> Arc<FakeFleet> {
        let fleet = Arc::new(FakeFleet::default());
        fleet.add_member(RegistryEntry::new("node-1", "10.0.0.1", 8080, "build-worker"));
        fleet.add_member(RegistryEntry::new("registry", "10.0.0.9", 8080, "build-registry"));
        fleet
    }

    fn check(fleet: &Arc<FakeFleet>, sink: &Arc<RecordingSink>, threshold: Duration) -> VersionDriftCheck {
        VersionDriftCheck::new(
            fleet.clone(),
            fleet.clone(),
            fleet.clone(),
            AlertEmitter::new(sink.clone()),
            DebounceTracker::new(),
            VersionDriftSettings {
                threshold,
                ..Default::default()
            },
        )
    }

    #[test]
    fn verdicts() {
        assert_eq!(evaluate_version("v1", None), VersionVerdict::NeverBuilt);
        assert_eq!(evaluate_version("", None), VersionVerdict::NeverBuilt);
        assert_eq!(evaluate_version("", Some("v1")), VersionVerdict::NotReporting);
        assert_eq!(evaluate_version("v1", Some("v1")), VersionVerdict::Matches);
        assert_eq!(
            evaluate_version("v1", Some("v2")),
            VersionVerdict::Drifted {
                running: "v1".into(),
                built: "v2".into()
            }
        );
    }

    #[tokio::test]
    async fn matching_versions_raise_nothing() {
        let fleet = fleet();
        fleet.set_jobs("node-1", &[("madeup", "v2")]);
        fleet.set_built("madeup", &["v2"]);
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, 60 * MIN);

        let report = check.tick(Instant::now()).await.unwrap();
        assert_eq!(report.subjects, 1);
        assert!(!report.alerted());
        assert_eq!(report.active, 0);
    }

    #[tokio::test]
    async fn never_built_alerts_immediately_every_poll() {
        let fleet = fleet();
        fleet.set_jobs("node-1", &[("madeup", "v2"), ("other", "")]);
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, 60 * MIN);

        let t0 = Instant::now();
        let first = check.tick(t0).await.unwrap();
        let second = check.tick(t0 + MIN).await.unwrap();

        assert_eq!(first.alerts.len(), 2);
        assert_eq!(second.alerts.len(), 2);
        assert!(first.alerts[0].message.contains("madeup has no version built"));
        assert_eq!(check.emitter.counter().raised(), 4);
        assert_eq!(check.tracker().active_count(), 0);
    }

    #[tokio::test]
    async fn drift_alerts_only_after_threshold() {
        let fleet = fleet();
        fleet.set_jobs("node-1", &[("madeup", "v1")]);
        fleet.set_built("madeup", &["v2", "v1"]);
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, 60 * MIN);

        let t0 = Instant::now();
        assert!(!check.tick(t0).await.unwrap().alerted());
        assert!(!check.tick(t0 + 30 * MIN).await.unwrap().alerted());
        let report = check.tick(t0 + 90 * MIN).await.unwrap();

        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].title, "Version Drift");
        assert!(report.alerts[0].message.contains("node-1"));
        assert!(report.alerts[0].message.contains("instead of v2"));
        assert_eq!(sink.titles(), vec!["Version Drift"]);
    }

    #[tokio::test]
    async fn drift_alerts_once_per_episode() {
        let fleet = fleet();
        fleet.set_jobs("node-1", &[("madeup", "v1")]);
        fleet.set_built("madeup", &["v2"]);
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, MIN);

        let t0 = Instant::now();
        check.tick(t0).await.unwrap();
        assert!(check.tick(t0 + 2 * MIN).await.unwrap().alerted());
        assert!(!check.tick(t0 + 3 * MIN).await.unwrap().alerted());
    }

    #[tokio::test]
    async fn drift_every_poll_policy_repeats() {
        let fleet = fleet();
        fleet.set_jobs("node-1", &[("madeup", "v1")]);
        fleet.set_built("madeup", &["v2"]);
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, MIN);
        check.tracker = DebounceTracker::with_policy(AlertPolicy::EveryPoll);

        let t0 = Instant::now();
        check.tick(t0).await.unwrap();
        assert!(check.tick(t0 + 2 * MIN).await.unwrap().alerted());
        assert!(check.tick(t0 + 3 * MIN).await.unwrap().alerted());
    }

    #[tokio::test]
    async fn match_clears_prior_mismatch() {
        let fleet = fleet();
        fleet.set_jobs("node-1", &[("madeup", "v1")]);
        fleet.set_built("madeup", &["v2"]);
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, 60 * MIN);

        let t0 = Instant::now();
        check.tick(t0).await.unwrap();
        assert_eq!(check.tracker().active_count(), 1);

        fleet.set_jobs("node-1", &[("madeup", "v2")]);
        let report = check.tick(t0 + 30 * MIN).await.unwrap();
        assert_eq!(report.active, 0);

        // Drift returns: the clock starts over.
        fleet.set_jobs("node-1", &[("madeup", "v1")]);
        assert!(!check.tick(t0 + 90 * MIN).await.unwrap().alerted());
        assert!(!check.tick(t0 + 120 * MIN).await.unwrap().alerted());
    }

    #[tokio::test]
    async fn unassigned_job_drops_its_episode() {
        let fleet = fleet();
        fleet.set_jobs("node-1", &[("madeup", "v1")]);
        fleet.set_built("madeup", &["v2"]);
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, 60 * MIN);

        let t0 = Instant::now();
        assert_eq!(check.tick(t0).await.unwrap().active, 1);

        fleet.set_jobs("node-1", &[]);
        assert_eq!(check.tick(t0 + 5 * MIN).await.unwrap().active, 0);

        // Reassigned much later, still stale: a new episode, not an old one.
        fleet.set_jobs("node-1", &[("madeup", "v1")]);
        let report = check.tick(t0 + 180 * MIN).await.unwrap();
        assert!(!report.alerted());
        assert_eq!(report.active, 1);
        assert!(sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn empty_running_version_clears_and_never_alerts() {
        let fleet = fleet();
        fleet.set_jobs("node-1", &[("madeup", "v1")]);
        fleet.set_built("madeup", &["v2"]);
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, MIN);

        let t0 = Instant::now();
        check.tick(t0).await.unwrap();
        fleet.set_jobs("node-1", &[("madeup", "")]);
        let report = check.tick(t0 + 10 * MIN).await.unwrap();

        assert!(!report.alerted());
        assert_eq!(report.active, 0);
    }

    #[tokio::test]
    async fn non_worker_members_are_ignored() {
        let fleet = fleet();
        fleet.set_jobs("registry", &[("madeup", "v1")]);
        fleet.set_built("madeup", &["v2"]);
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, MIN);

        let report = check.tick(Instant::now()).await.unwrap();
        assert_eq!(report.subjects, 0);
    }

    #[tokio::test]
    async fn batch_mode_queries_registry_once_per_tick() {
        let fleet = fleet();
        fleet.add_member(RegistryEntry::new("node-2", "10.0.0.2", 8080, "build-worker"));
        fleet.set_jobs("node-1", &[("a", "v1"), ("b", "v1")]);
        fleet.set_jobs("node-2", &[("a", "v1"), ("c", "v1")]);
        fleet.set_built("a", &["v1"]);
        fleet.set_built("b", &["v1"]);
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, MIN);
        check.settings.query = VersionQueryMode::Batch;

        let report = check.tick(Instant::now()).await.unwrap();

        assert_eq!(fleet.registry_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.subjects, 4);
        // Job "c" is absent from the batch listing.
        assert_eq!(report.alerts.len(), 1);
        assert!(report.alerts[0].message.starts_with("c has no version"));
    }

    #[tokio::test]
    async fn fetch_failure_aborts_tick() {
        let fleet = fleet();
        fleet.set_jobs("node-1", &[("madeup", "v1")]);
        fleet.fail_on("versions");
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, MIN);

        let err = check.tick(Instant::now()).await.unwrap_err();
        assert!(matches!(err, CheckError::Fetch(FetchError::Transport { .. })));
        assert!(sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn directory_failure_is_fetch_error() {
        let fleet = fleet();
        fleet.fail_on("members");
        let sink = Arc::new(RecordingSink::default());
        let mut check = check(&fleet, &sink, MIN);

        assert!(matches!(
            check.tick(Instant::now()).await,
            Err(CheckError::Fetch(_))
        ));
    }
}
