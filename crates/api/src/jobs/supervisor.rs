//! Per-job process supervisor.
//!
//! One [`JobSupervisor`] task consumes the ordered [`ProcessEvent`] stream of
//! a spawned script and is the only writer of that job's logs until the job
//! settles. Every appended entry is published on the [`EventBus`]; entries are
//! also batched into incremental `running` callbacks.

use std::sync::Arc;

use geohub_core::job::JobStatus;
use geohub_core::log::{parse_stdout_line, stderr_entry, LogEntry, StdoutLine};
use geohub_core::scripting::{ExitOutcome, ProcessEvent};
use geohub_core::types::JobId;
use geohub_events::{CallbackEvent, EventBus, JobEvent};
use serde_json::Value;
use tokio::sync::mpsc;

use super::dispatch::CallbackDispatcher;
use super::registry::{lock_job, SharedJob};

/// How a job leaves the running state.
pub(crate) enum Settlement {
    Success { result: Option<Value> },
    Failed,
}

/// Apply a terminal transition, publish it, then queue the final callback
/// carrying the full log set (and the result, on success).
pub(crate) fn settle(
    job: &SharedJob,
    bus: &EventBus,
    callback: &CallbackDispatcher,
    final_entry: LogEntry,
    settlement: Settlement,
) {
    let settled = {
        let mut guard = lock_job(job);
        let applied = match settlement {
            Settlement::Success { result } => guard.succeed(final_entry.clone(), result),
            Settlement::Failed => guard.fail(final_entry.clone()),
        };
        if let Err(e) = applied {
            tracing::error!(job_id = %guard.id, error = %e, "Ignoring terminal transition");
            return;
        }
        bus.publish(JobEvent::log(&guard.id, final_entry));
        bus.publish(JobEvent::status(&guard.id, guard.status));
        guard.clone()
    };

    tracing::info!(
        job_id = %settled.id,
        status = %settled.status,
        log_count = settled.logs.len(),
        "Job finished",
    );

    callback.send(
        CallbackEvent::new(settled.id, settled.status)
            .with_logs(settled.logs)
            .with_result(settled.result),
    );
}

/// Final log entry describing how the process ended.
fn exit_entry(outcome: ExitOutcome) -> (LogEntry, bool) {
    match outcome.code {
        Some(0) => (LogEntry::info("Process exited successfully"), true),
        Some(code) => (LogEntry::error(format!("Process exited with code {code}")), false),
        None => (LogEntry::error("Process was terminated by a signal"), false),
    }
}

pub(crate) struct JobSupervisor {
    job_id: JobId,
    job: SharedJob,
    bus: Arc<EventBus>,
    callback: CallbackDispatcher,
    batch_size: usize,
    batch: Vec<LogEntry>,
    result: Option<Value>,
}

impl JobSupervisor {
    pub(crate) fn new(
        job_id: JobId,
        job: SharedJob,
        bus: Arc<EventBus>,
        callback: CallbackDispatcher,
        batch_size: usize,
    ) -> Self {
        Self {
            job_id,
            job,
            bus,
            callback,
            batch_size: batch_size.max(1),
            batch: Vec::new(),
            result: None,
        }
    }

    /// Drain `events` until the process exit is reported, then settle the job.
    pub(crate) async fn run(mut self, mut events: mpsc::UnboundedReceiver<ProcessEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ProcessEvent::Stdout(line) => match parse_stdout_line(&line) {
                    StdoutLine::Log(entry) => self.append(entry),
                    // Last one wins; attached only on success.
                    StdoutLine::Result(value) => self.result = Some(value),
                    StdoutLine::Blank => {}
                },
                ProcessEvent::Stderr(line) => {
                    if !line.trim().is_empty() {
                        self.append(stderr_entry(&line));
                    }
                }
                ProcessEvent::Exited(outcome) => {
                    let (entry, succeeded) = exit_entry(outcome);
                    let settlement = if succeeded {
                        Settlement::Success {
                            result: self.result.take(),
                        }
                    } else {
                        Settlement::Failed
                    };
                    settle(&self.job, &self.bus, &self.callback, entry, settlement);
                    return;
                }
            }
        }

        tracing::error!(job_id = %self.job_id, "Process output ended without an exit status");
        settle(
            &self.job,
            &self.bus,
            &self.callback,
            LogEntry::error("Process output ended without an exit status"),
            Settlement::Failed,
        );
    }

    fn append(&mut self, entry: LogEntry) {
        {
            let mut guard = lock_job(&self.job);
            if let Err(e) = guard.append_log(entry.clone()) {
                tracing::warn!(job_id = %self.job_id, error = %e, "Dropping log entry");
                return;
            }
            self.bus.publish(JobEvent::log(&self.job_id, entry.clone()));
        }

        self.batch.push(entry);
        if self.batch.len() >= self.batch_size {
            let logs = std::mem::take(&mut self.batch);
            self.callback.send(
                CallbackEvent::new(self.job_id.clone(), JobStatus::Running).with_logs(logs),
            );
        }
    }
}
