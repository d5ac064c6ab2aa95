//! In-memory job registry.
//!
//! Held in [`AppState`](crate::state::AppState) as an `Arc<JobRegistry>`.
//! Created at server start and cleared at shutdown; entries are never removed
//! while the server runs.
//!
//! Lifecycle of a submission:
//! 1. Reserve the job id (a duplicate caller-supplied id is the only error).
//! 2. Resolve the job type and check the configuration. Failures settle the
//!    job as `failed` with a single error entry; nothing is spawned.
//! 3. Mark the job running and spawn the mapped script.
//! 4. Hand the output channel to a [`JobSupervisor`] task and return.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use geohub_core::error::CoreError;
use geohub_core::job::{Job, JobStatus, JobSummary, JobType};
use geohub_core::log::LogEntry;
use geohub_core::scripting::subprocess::spawn_streaming;
use geohub_core::scripting::{ScriptCatalog, ScriptError};
use geohub_core::types::{new_job_id, JobId};
use geohub_events::{CallbackEvent, EventBus, JobEvent, Notifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use super::dispatch::CallbackDispatcher;
use super::supervisor::{settle, JobSupervisor, Settlement};

/// Default number of log entries per incremental `running` callback.
pub const DEFAULT_LOG_BATCH_SIZE: usize = 20;

/// A job record shared between the registry and its supervisor task.
pub type SharedJob = Arc<Mutex<Job>>;

/// Lock a job record. Job state is plain data, so a poisoned lock is still usable.
pub(crate) fn lock_job(job: &SharedJob) -> MutexGuard<'_, Job> {
    job.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Request body for `POST /api/v1/jobs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJob {
    /// Caller-chosen id; a UUID v4 is generated when absent.
    #[serde(default)]
    pub job_id: Option<JobId>,
    pub job_type: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub callback_url: Option<String>,
}

/// What the submitter learns immediately.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, SharedJob>>,
    catalog: Arc<ScriptCatalog>,
    notifier: Arc<dyn Notifier>,
    bus: Arc<EventBus>,
    log_batch_size: usize,
}

impl JobRegistry {
    pub fn new(catalog: Arc<ScriptCatalog>, notifier: Arc<dyn Notifier>, bus: Arc<EventBus>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            catalog,
            notifier,
            bus,
            log_batch_size: DEFAULT_LOG_BATCH_SIZE,
        }
    }

    /// Number of log entries accumulated before an incremental callback is sent.
    pub fn with_log_batch_size(mut self, size: usize) -> Self {
        self.log_batch_size = size.max(1);
        self
    }

    /// Create a job and start its script.
    ///
    /// Returns as soon as the process is spawned. Invalid job types,
    /// incomplete configuration, and spawn failures are recorded on the job
    /// (status `failed`) rather than returned.
    pub async fn submit(&self, request: SubmitJob) -> Result<SubmitOutcome, CoreError> {
        let SubmitJob {
            job_id,
            job_type: raw_type,
            config,
            callback_url,
        } = request;

        let job_id = job_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_job_id);
        let job = self.insert(Job::new(job_id.clone(), raw_type.clone(), config.clone()))?;
        let callback = CallbackDispatcher::spawn(Arc::clone(&self.notifier), callback_url);

        let job_type = match resolve(&raw_type, &config) {
            Ok(job_type) => job_type,
            Err(message) => {
                tracing::warn!(job_id = %job_id, job_type = %raw_type, %message, "Job rejected");
                return Ok(self.settle_failed(&job, &callback, message));
            }
        };

        {
            let mut guard = lock_job(&job);
            guard.start()?;
            self.bus.publish(JobEvent::status(&job_id, JobStatus::Running));
        }

        let descriptor = self.catalog.descriptor(job_type);
        let events = match spawn_streaming(&descriptor, &config).await {
            Ok(events) => events,
            Err(e) => {
                let message = match &e {
                    ScriptError::NotFound(_) | ScriptError::SpawnFailed { .. } => e.to_string(),
                    other => format!("Failed to start process: {other}"),
                };
                tracing::error!(job_id = %job_id, job_type = %job_type, error = %message, "Job failed to start");
                return Ok(self.settle_failed(&job, &callback, message));
            }
        };

        tracing::info!(
            job_id = %job_id,
            job_type = %job_type,
            script = %descriptor.display_path(),
            "Job started",
        );
        callback.send(CallbackEvent::new(job_id.clone(), JobStatus::Running));

        let supervisor = JobSupervisor::new(
            job_id.clone(),
            job,
            Arc::clone(&self.bus),
            callback,
            self.log_batch_size,
        );
        tokio::spawn(supervisor.run(events));

        Ok(SubmitOutcome {
            job_id,
            status: JobStatus::Running,
            message: None,
        })
    }

    /// Snapshot of a job.
    pub fn get(&self, job_id: &str) -> Option<Job> {
        let job = self.find(job_id)?;
        let snapshot = lock_job(&job).clone();
        Some(snapshot)
    }

    /// Snapshot of a job together with a subscription to its later updates.
    ///
    /// Events are published under the job lock, so every update is either
    /// reflected in the snapshot or delivered on the receiver, never both.
    pub fn watch(&self, job_id: &str) -> Option<(Job, broadcast::Receiver<JobEvent>)> {
        let job = self.find(job_id)?;
        let guard = lock_job(&job);
        let rx = self.bus.subscribe();
        let snapshot = guard.clone();
        drop(guard);
        Some((snapshot, rx))
    }

    /// Summaries of all jobs, oldest first.
    pub fn list(&self) -> Vec<JobSummary> {
        let handles: Vec<SharedJob> = self.read_jobs().values().cloned().collect();
        let mut summaries: Vec<JobSummary> =
            handles.iter().map(|job| lock_job(job).summary()).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_jobs().is_empty()
    }

    /// Drop every job record. Supervisor tasks still running keep their own handle.
    pub fn clear(&self) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(count = jobs.len(), "Clearing job registry");
        jobs.clear();
    }

    fn find(&self, job_id: &str) -> Option<SharedJob> {
        self.read_jobs().get(job_id).cloned()
    }

    fn read_jobs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<JobId, SharedJob>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, job: Job) -> Result<SharedJob, CoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        match jobs.entry(job.id.clone()) {
            Entry::Occupied(_) => Err(CoreError::Conflict(format!("Job {} already exists", job.id))),
            Entry::Vacant(slot) => Ok(Arc::clone(slot.insert(Arc::new(Mutex::new(job))))),
        }
    }

    fn settle_failed(&self, job: &SharedJob, callback: &CallbackDispatcher, message: String) -> SubmitOutcome {
        let job_id = lock_job(job).id.clone();
        settle(
            job,
            &self.bus,
            callback,
            LogEntry::error(message.clone()),
            Settlement::Failed,
        );
        SubmitOutcome {
            job_id,
            status: JobStatus::Failed,
            message: Some(message),
        }
    }
}

/// Resolve the submitted type name and check the configuration for it.
fn resolve(raw_type: &str, config: &Value) -> Result<JobType, String> {
    let job_type: JobType = raw_type.parse().map_err(describe)?;
    job_type.validate_config(config).map_err(describe)?;
    Ok(job_type)
}

fn describe(err: CoreError) -> String {
    match err {
        CoreError::Validation(msg) => msg,
        other => other.to_string(),
    }
}
