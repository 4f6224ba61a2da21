//! Gossip consistency checks.
//!
//! `FriendCountCheck` compares how many friends each peer reports against
//! the local view. `SplitBrainCheck` picks two random peers and compares
//! their full registry listings entry by entry.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use driftwatch_core::*;

use crate::check::{Check, TickReport};
use crate::emitter::AlertEmitter;

/// First entry of `first` with no exact counterpart in `second`.
pub fn find_unmatched<'a>(
    first: &'a [RegistryEntry],
    second: &[RegistryEntry],
) -> Option<&'a RegistryEntry> {
    first.iter().find(|entry| !second.contains(entry))
}

fn render_listing(listing: &[RegistryEntry]) -> String {
    let entries: Vec<String> = listing.iter().map(ToString::to_string).collect();
    format!("[{}]", entries.join(", "))
}

// ── Friend count ──────────────────────────────────────────────────

pub struct FriendCountCheck {
    gossip: Arc<dyn Gossip>,
    emitter: AlertEmitter,
    /// The node whose view we audit, for alert messages.
    local_node: String,
}

impl FriendCountCheck {
    pub fn new(gossip: Arc<dyn Gossip>, emitter: AlertEmitter, local_node: &str) -> Self {
        Self {
            gossip,
            emitter,
            local_node: local_node.to_string(),
        }
    }
}

#[async_trait]
impl Check for FriendCountCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::FriendCount
    }

    fn diagnostic_title(&self) -> &'static str {
        "Friend Finder"
    }

    async fn tick(&mut self, _now: Instant) -> CheckResult<TickReport> {
        let mut report = TickReport::new(CheckKind::FriendCount);
        let friends = self.gossip.friend_list().await?;

        for friend in friends.addresses() {
            report.subjects += 1;
            let remote = self.gossip.remote_friend_list(friend).await?;
            if remote.len() != friends.len() {
                let alert = Alert::new(
                    "Friend mismatch",
                    format!(
                        "For {},{} -> {} != {}",
                        self.local_node, friend, friends, remote
                    ),
                );
                self.emitter.emit(&alert).await;
                report.alerts.push(alert);
            }
        }

        Ok(report)
    }
}

// ── Split brain ───────────────────────────────────────────────────

pub struct SplitBrainCheck {
    gossip: Arc<dyn Gossip>,
    directory: Arc<dyn Directory>,
    emitter: AlertEmitter,
    rng: StdRng,
}

impl SplitBrainCheck {
    pub fn new(gossip: Arc<dyn Gossip>, directory: Arc<dyn Directory>, emitter: AlertEmitter) -> Self {
        Self {
            gossip,
            directory,
            emitter,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed RNG, for reproducible peer selection.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Two distinct peers in random order, so successive ticks rotate
    /// through every pair.
    fn pick_pair(&mut self, friends: &FriendList) -> CheckResult<(String, String)> {
        let mut candidates = friends.addresses().to_vec();
        candidates.sort();
        candidates.dedup();
        if candidates.len() < 2 {
            return Err(CheckError::Precondition(format!(
                "need at least two friends to compare, have {friends}"
            )));
        }
        candidates.shuffle(&mut self.rng);
        let second = candidates.swap_remove(1);
        let first = candidates.swap_remove(0);
        Ok((first, second))
    }
}

#[async_trait]
impl Check for SplitBrainCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::SplitBrain
    }

    fn diagnostic_title(&self) -> &'static str {
        "Friend Evaluator"
    }

    async fn tick(&mut self, _now: Instant) -> CheckResult<TickReport> {
        let mut report = TickReport::new(CheckKind::SplitBrain);
        let friends = self.gossip.friend_list().await?;
        let (first, second) = self.pick_pair(&friends)?;
        for peer in [&first, &second] {
            self.gossip.peer_ready(peer).await?;
        }
        debug!(%first, %second, "comparing registry listings");

        let first_listing = self.directory.registry_listing(&first).await?;
        let second_listing = self.directory.registry_listing(&second).await?;
        report.subjects = 2;

        if let Some(entry) = find_unmatched(&first_listing, &second_listing) {
            warn!(%first, %second, unmatched = %entry, "registry listings diverge");
            let alert = Alert::new(
                "Split Brain",
                format!(
                    "Mismatch in directory listing {} {} and then {} {} ({})",
                    first,
                    render_listing(&first_listing),
                    second,
                    render_listing(&second_listing),
                    entry
                ),
            );
            self.emitter.emit(&alert).await;
            report.alerts.push(alert);
        }

        Ok(report)
    }
}
