//! Error types for fetching fleet state and running checks.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for collaborator fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type alias for a single check tick.
pub type CheckResult<T> = Result<T, CheckError>;

/// A remote call failed or returned something unusable.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error talking to {target}: {message}")]
    Transport { target: String, message: String },

    #[error("{target} did not answer within {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("{target} returned HTTP {status}")]
    Status { target: String, status: u16 },

    #[error("malformed response from {target}: {message}")]
    Malformed { target: String, message: String },

    #[error("{target} is not ready to serve yet")]
    NotReady { target: String },

    #[error("{target} reported no friend list")]
    NoFriends { target: String },
}

impl FetchError {
    pub fn transport(target: &str, err: impl std::fmt::Display) -> Self {
        FetchError::Transport {
            target: target.to_string(),
            message: err.to_string(),
        }
    }

    pub fn malformed(target: &str, err: impl std::fmt::Display) -> Self {
        FetchError::Malformed {
            target: target.to_string(),
            message: err.to_string(),
        }
    }
}

/// Why a check could not reach a verdict this tick.
///
/// Detected fleet conditions are not errors; they flow through the
/// evaluators and are reported in the tick result.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("precondition failed: {0}")]
    Precondition(String),
}

/// Errors loading or validating `driftwatch.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    Duration { field: String, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}
