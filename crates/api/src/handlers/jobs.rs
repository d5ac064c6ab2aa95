//! Handlers for the `/jobs` resource.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use geohub_core::error::CoreError;
use geohub_core::job::Job;
use geohub_events::JobEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use crate::error::{AppError, AppResult};
use crate::jobs::{JobRegistry, SubmitJob};
use crate::response::DataResponse;
use crate::state::AppState;

fn job_not_found(id: String) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "Job", id })
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create a job and start its script. Returns 202 immediately with the job
/// id and its status (`running`, or `failed` with a message when the job
/// was rejected before starting). A duplicate `jobId` returns 409.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.registry.submit(input).await?;

    tracing::info!(
        job_id = %outcome.job_id,
        status = %outcome.status,
        "Job submitted",
    );

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: outcome })))
}

// ---------------------------------------------------------------------------
// List / Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: state.registry.list(),
    }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .registry
        .get(&job_id)
        .ok_or_else(|| job_not_found(job_id))?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Events (SSE)
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/events
///
/// Server-sent events for one job. The first event (`snapshot`) carries the
/// full job; `log` and `status` events follow as they happen. The stream
/// ends after the terminal status event, or right after the snapshot when
/// the job has already finished. A `lagged` event means updates were
/// dropped and the client should refetch the job. When the job finished
/// during a lag, a final `snapshot` is sent instead and the stream ends.
pub async fn job_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let (snapshot, rx) = state
        .registry
        .watch(&job_id)
        .ok_or_else(|| job_not_found(job_id.clone()))?;

    let done = snapshot.status.is_terminal();
    let initial = snapshot_event(&snapshot)
        .map_err(|e| AppError::InternalError(format!("Failed to encode job snapshot: {e}")))?;

    let watcher = EventWatcher {
        rx,
        job_id,
        registry: Arc::clone(&state.registry),
        done,
    };
    let updates = stream::unfold(watcher, |mut watcher| async move {
        let event = watcher.next_event().await?;
        Some((Ok::<_, Infallible>(event), watcher))
    });

    let events = stream::once(async move { Ok::<_, Infallible>(initial) }).chain(updates);
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn snapshot_event(job: &Job) -> Result<Event, axum::Error> {
    Event::default().event("snapshot").json_data(job)
}

/// Per-connection state of a job event stream.
struct EventWatcher {
    rx: Receiver<JobEvent>,
    job_id: String,
    registry: Arc<JobRegistry>,
    done: bool,
}

impl EventWatcher {
    /// Next SSE event for this job, or `None` once the stream should end.
    async fn next_event(&mut self) -> Option<Event> {
        if self.done {
            return None;
        }
        loop {
            match self.rx.recv().await {
                Ok(event) if event.job_id == self.job_id => {
                    self.done = event.is_terminal();
                    match Event::default().event(event.event_name()).json_data(&event) {
                        Ok(sse) => return Some(sse),
                        Err(e) => {
                            tracing::warn!(job_id = %self.job_id, error = %e, "Skipping unencodable job event");
                        }
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(job_id = %self.job_id, skipped, "Event stream lagged");
                    return self.after_lag(skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// The terminal status may have been among the dropped events, so the
    /// registry decides whether the stream can still end on its own.
    fn after_lag(&mut self, skipped: u64) -> Option<Event> {
        let job = self.registry.get(&self.job_id)?;
        if !job.status.is_terminal() {
            return Some(Event::default().event("lagged").data(skipped.to_string()));
        }
        self.done = true;
        match snapshot_event(&job) {
            Ok(sse) => Some(sse),
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Failed to encode final job snapshot");
                None
            }
        }
    }
}
