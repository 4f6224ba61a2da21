//! Alert sinks.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use tracing::{error, warn};

use driftwatch_core::{Alert, AlertSink};

use crate::fleet::DEFAULT_TIMEOUT;
use crate::request::send;

/// POSTs each alert as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    url: String,
    timeout: Duration,
}

impl WebhookSink {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn raise_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        let body = serde_json::to_vec(alert)?;
        send(Method::POST, &self.url, Some(Bytes::from(body)), self.timeout).await?;
        Ok(())
    }
}

/// Writes alerts to the log. Paging alerts are logged as errors.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn raise_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        if alert.page {
            error!(title = %alert.title, message = %alert.message, "ALERT");
        } else {
            warn!(title = %alert.title, message = %alert.message, "ALERT");
        }
        Ok(())
    }
}
