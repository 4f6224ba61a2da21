//! driftwatch-core — shared vocabulary for the driftwatch fleet watchdog.
//!
//! Holds the snapshot types returned by fleet collaborators, the
//! capability traits those collaborators implement, the error taxonomy
//! shared by every check, and the `driftwatch.toml` config parser.
//!
//! # Architecture
//!
//! ```text
//! driftwatchd
//!   ├── WatchConfig (driftwatch.toml)
//!   ├── driftwatch-client  → implements fleet::{Directory, BuildRegistry, ...}
//!   └── driftwatch-checks  → consumes fleet traits, emits Alerts
//!         └── driftwatch-debounce (per-check DebounceTracker)
//! ```

pub mod config;
pub mod duration;
pub mod error;
pub mod fleet;
pub mod types;

pub use config::WatchConfig;
pub use duration::parse_duration;
pub use error::{CheckError, CheckResult, ConfigError, FetchError, FetchResult};
pub use fleet::{AlertSink, BuildRegistry, Directory, Gossip, Scheduler, Telemetry};
pub use types::*;
