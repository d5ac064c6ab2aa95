//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans out [`JobEvent`]s to any number of subscribers (one per
//! open server-sent-events stream). It is shared via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use geohub_core::job::JobStatus;
use geohub_core::log::LogEntry;
use geohub_core::types::JobId;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// What changed on a job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobEventKind {
    /// A log entry was appended.
    Log { entry: LogEntry },
    /// The job moved to a new status.
    Status { status: JobStatus },
}

/// A change to one job, as broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: JobId,
    #[serde(flatten)]
    pub kind: JobEventKind,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn log(job_id: impl Into<JobId>, entry: LogEntry) -> Self {
        Self {
            job_id: job_id.into(),
            kind: JobEventKind::Log { entry },
            timestamp: Utc::now(),
        }
    }

    pub fn status(job_id: impl Into<JobId>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            kind: JobEventKind::Status { status },
            timestamp: Utc::now(),
        }
    }

    /// True for a status event carrying a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, JobEventKind::Status { status } if status.is_terminal())
    }

    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self.kind {
            JobEventKind::Log { .. } => "log",
            JobEventKind::Status { .. } => "status",
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use geohub_core::job::JobStatus;
/// use geohub_events::bus::{EventBus, JobEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::status("job-1", JobStatus::Running));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: JobEvent) {
        // A send error only means there are no receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
