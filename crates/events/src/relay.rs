//! Best-effort callback relay.
//!
//! A [`Notifier`] pushes job status changes to the external persistence
//! endpoint named by the job's callback URL. Delivery is at-most-once:
//! [`WebhookNotifier`] makes a single POST and logs (then drops) any failure.
//! The job registry's in-memory state stays authoritative regardless.

use std::time::Duration;

use async_trait::async_trait;
use geohub_core::job::JobStatus;
use geohub_core::log::LogEntry;
use geohub_core::types::JobId;
use serde::Serialize;
use serde_json::Value;

/// Default HTTP request timeout for a single delivery attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// CallbackEvent
// ---------------------------------------------------------------------------

/// Body of a callback notification: `{ jobId, status, logs?, result? }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<LogEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl CallbackEvent {
    pub fn new(job_id: impl Into<JobId>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            logs: None,
            result: None,
        }
    }

    /// Attach logs; an empty batch is omitted from the payload.
    pub fn with_logs(mut self, logs: Vec<LogEntry>) -> Self {
        self.logs = (!logs.is_empty()).then_some(logs);
        self
    }

    pub fn with_result(mut self, result: Option<Value>) -> Self {
        self.result = result;
        self
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Fire-and-forget notification capability.
///
/// Implementations must never fail or panic towards the caller; delivery
/// problems are theirs to log.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, url: &str, event: CallbackEvent);
}

/// Notifier that drops every event. Used when callbacks are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, url: &str, event: CallbackEvent) {
        tracing::trace!(url, job_id = %event.job_id, "Callback dropped (notifier disabled)");
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Why a single delivery attempt failed. Only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Callback endpoint returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

/// Delivers callback events via HTTP POST, once, without retry.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Build a notifier whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Build a notifier around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Execute a single POST request and check the response status.
    pub async fn try_send(&self, url: &str, event: &CallbackEvent) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(event).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, url: &str, event: CallbackEvent) {
        match self.try_send(url, &event).await {
            Ok(()) => {
                tracing::info!(url, job_id = %event.job_id, status = %event.status, "Callback sent");
            }
            Err(e) => {
                tracing::warn!(
                    url,
                    job_id = %event.job_id,
                    status = %event.status,
                    error = %e,
                    "Callback delivery failed; not retrying"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
