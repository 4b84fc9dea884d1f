//! Best-effort completion notification for finished runs.

use crate::config::NotificationConfig;
use crate::error::{CodexError, Result};
use crate::state_machine::RunState;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Payload sent when a run finishes
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCompletion {
    pub run_id: Uuid,
    pub subject: String,
    pub status: RunState,
    pub codex_count: usize,
    pub failed_codexes: Vec<String>,
}

#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, completion: &RunCompletion) -> Result<()>;
}

/// Used when no webhook is configured
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl CompletionNotifier for NoopNotifier {
    async fn notify(&self, completion: &RunCompletion) -> Result<()> {
        debug!(run_id = %completion.run_id, "No completion notifier configured");
        Ok(())
    }
}

/// POSTs the completion payload as JSON
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CodexError::NotificationError(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Webhook notifier when a URL is configured, otherwise a no-op
    pub fn from_config(config: &NotificationConfig) -> Result<Box<dyn CompletionNotifier>> {
        match config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => Ok(Box::new(Self::new(
                url,
                Duration::from_secs(config.timeout_seconds),
            )?)),
            None => Ok(Box::new(NoopNotifier)),
        }
    }
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn notify(&self, completion: &RunCompletion) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(completion)
            .send()
            .await
            .map_err(|e| CodexError::NotificationError(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CodexError::NotificationError(format!(
                "webhook responded with HTTP {}",
                status.as_u16()
            )));
        }
        debug!(run_id = %completion.run_id, "Completion notification delivered");
        Ok(())
    }
}
