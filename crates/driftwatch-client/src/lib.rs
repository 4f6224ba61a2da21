//! driftwatch-client — HTTP/JSON adapters for the fleet collaborators.
//!
//! [`HttpFleetClient`] implements every capability trait from
//! `driftwatch_core::fleet` over plain HTTP/1.1. Alerts go to a
//! [`WebhookSink`], or to the log through [`LogSink`] when no webhook is
//! configured.

mod request;
pub mod fleet;
pub mod sink;

pub use fleet::{DEFAULT_TIMEOUT, HttpFleetClient};
pub use sink::{LogSink, WebhookSink};

#[cfg(test)]
pub(crate) mod testserver;
