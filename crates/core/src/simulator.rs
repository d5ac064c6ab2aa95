//! Backend-free execution simulator for demo and preview pages.
//!
//! Replays a fixed sequence of `(type, message, delay)` steps as if a real
//! job were producing them. Each run owns a [`CancellationToken`] that is
//! checked at every suspension point: [`ExecutionSimulator::reset`] and any
//! newer [`ExecutionSimulator::execute`] call cancel the in-flight run, so a
//! stale continuation can never append to a reset simulator.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::job::{JobStatus, JobType};
use crate::log::{LogEntry, LogType};

/// One scripted log line and the delay before it is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStep {
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub message: String,
    pub delay_ms: u64,
}

impl SimulationStep {
    pub fn new(log_type: LogType, message: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            log_type,
            message: message.into(),
            delay_ms,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// A simulated log entry; carries its own id for UI list keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedLogEntry {
    pub id: Uuid,
    #[serde(flatten)]
    pub entry: LogEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationOutcome {
    Success,
    Failed,
    /// The run was superseded by `reset` or a newer `execute`.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorState {
    pub status: JobStatus,
    pub logs: Vec<SimulatedLogEntry>,
}

impl Default for SimulatorState {
    fn default() -> Self {
        Self {
            status: JobStatus::Pending,
            logs: Vec::new(),
        }
    }
}

struct Inner {
    state: SimulatorState,
    current_run: CancellationToken,
}

/// Cooperative, cancellable log replayer.
pub struct ExecutionSimulator {
    inner: Mutex<Inner>,
}

impl ExecutionSimulator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SimulatorState::default(),
                current_run: CancellationToken::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // State is plain data; a panic elsewhere cannot leave it half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replay `steps` in order.
    ///
    /// Clears previous logs and sets `running`, then for each step sleeps
    /// its delay and appends one entry. The first `error` step ends the run
    /// as `failed`; exhausting the sequence ends it as `success`.
    pub async fn execute(&self, steps: Vec<SimulationStep>) -> SimulationOutcome {
        let token = {
            let mut inner = self.lock();
            inner.current_run.cancel();
            let token = CancellationToken::new();
            inner.current_run = token.clone();
            inner.state.status = JobStatus::Running;
            inner.state.logs.clear();
            token
        };

        for step in steps {
            tokio::select! {
                biased;
                _ = token.cancelled() => return SimulationOutcome::Cancelled,
                _ = tokio::time::sleep(step.delay()) => {}
            }

            let mut inner = self.lock();
            // `reset` cancels under the same lock, so this check cannot race.
            if token.is_cancelled() {
                return SimulationOutcome::Cancelled;
            }

            let is_error = step.log_type == LogType::Error;
            inner.state.logs.push(SimulatedLogEntry {
                id: Uuid::new_v4(),
                entry: LogEntry::new(step.log_type, step.message),
            });

            if is_error {
                inner.state.status = JobStatus::Failed;
                return SimulationOutcome::Failed;
            }
        }

        let mut inner = self.lock();
        if token.is_cancelled() {
            return SimulationOutcome::Cancelled;
        }
        inner.state.status = JobStatus::Success;
        SimulationOutcome::Success
    }

    /// Return to `pending` with no logs, cancelling any in-flight run.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.current_run.cancel();
        inner.state = SimulatorState::default();
    }

    pub fn snapshot(&self) -> SimulatorState {
        self.lock().state.clone()
    }
}

impl Default for ExecutionSimulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Canned demo sequences, one per job type.
pub struct SimulationScript;

impl SimulationScript {
    pub fn for_job_type(job_type: JobType) -> Vec<SimulationStep> {
        use LogType::{Info, Success, Warning};

        match job_type {
            JobType::Extraction => vec![
                SimulationStep::new(Info, "Starting extraction from source geodatabase", 400),
                SimulationStep::new(Info, "Found 4 feature classes", 600),
                SimulationStep::new(Info, "Extracting: Parcels", 800),
                SimulationStep::new(Success, "Parcels: 15420 features extracted", 1200),
                SimulationStep::new(Info, "Extracting: Roads", 600),
                SimulationStep::new(Success, "Roads: 8350 features extracted", 1000),
                SimulationStep::new(Info, "Extracting: Buildings", 600),
                SimulationStep::new(Success, "Buildings: 12800 features extracted", 1100),
                SimulationStep::new(Info, "Extracting: Hydrants", 500),
                SimulationStep::new(Success, "Hydrants: 2150 features extracted", 700),
                SimulationStep::new(Success, "Extraction complete! 4 files created.", 400),
            ],
            JobType::Migration => vec![
                SimulationStep::new(Info, "Starting SDE to SDE migration", 400),
                SimulationStep::new(Info, "Connecting to source enterprise geodatabase", 700),
                SimulationStep::new(Info, "Connecting to target enterprise geodatabase", 700),
                SimulationStep::new(Info, "Migrating: Parcels", 900),
                SimulationStep::new(Success, "Parcels: 15420 → 15420 rows", 1400),
                SimulationStep::new(Info, "Migrating: Roads", 800),
                SimulationStep::new(Warning, "Roads: 8350 → 8348 rows", 1200),
                SimulationStep::new(Success, "Migration complete! 2 feature classes processed.", 500),
            ],
            JobType::Comparison => vec![
                SimulationStep::new(Info, "Starting schema comparison", 400),
                SimulationStep::new(Success, "Source: 15420 features", 800),
                SimulationStep::new(Success, "Target: 15418 features", 800),
                SimulationStep::new(Warning, "Feature count mismatch (-2)", 300),
                SimulationStep::new(Info, "Comparing field definitions", 900),
                SimulationStep::new(Success, "Schema: 11/12 fields match", 700),
                SimulationStep::new(Success, "Comparison complete!", 300),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
