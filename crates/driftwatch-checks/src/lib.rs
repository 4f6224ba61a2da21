//! driftwatch-checks — the fleet checks and the loop that drives them.
//!
//! # Architecture
//!
//! ```text
//! CheckDriver (one tokio task per check kind)
//!   └── every `interval`: Check::tick(now)
//!         ├── fetch snapshots via driftwatch_core::fleet traits
//!         ├── evaluate conditions (pure functions per check)
//!         ├── DebounceTracker::evaluate (debounced conditions only)
//!         └── AlertEmitter::emit → AlertSink
//! ```
//!
//! A tick that fails to fetch, or lacks the data to judge, is abandoned.
//! The driver raises a diagnostic alert about the checker itself and
//! waits for the next tick.

pub mod categorical;
pub mod check;
pub mod driver;
pub mod emitter;
pub mod peers;
pub mod threshold;
pub mod version;

#[cfg(test)]
pub(crate) mod fakes;

pub use categorical::{CategoricalCheck, CategoricalSettings, CategoricalVerdict};
pub use check::{Check, TickReport};
pub use driver::CheckDriver;
pub use emitter::{AlertCounter, AlertEmitter};
pub use peers::{FriendCountCheck, SplitBrainCheck};
pub use threshold::{ThresholdCheck, ThresholdPolicy, ThresholdSettings};
pub use version::{VersionDriftCheck, VersionDriftSettings, VersionVerdict};
