//! driftwatch-debounce — turns noisy "condition holds now" samples into
//! stable alert decisions.
//!
//! # Semantics
//!
//! ```text
//! holds == false           → forget the key, never alert   (fast clear)
//! holds == true, new key   → remember `now`, never alert   (first sighting)
//! holds == true, known key → alert iff now - first_seen > threshold
//! ```
//!
//! What happens after the first alert of an episode is governed by
//! [`AlertPolicy`]: `OncePerEpisode` stays quiet until the key clears,
//! `EveryPoll` keeps firing on every qualifying poll.
//!
//! State lives in process memory only. A restart resets every timer.

pub mod tracker;

pub use driftwatch_core::AlertPolicy;
pub use tracker::{ConditionKey, DebounceTracker};
