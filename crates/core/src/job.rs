//! Job model and lifecycle state machine.
//!
//! ```text
//! pending ──> running ──> success
//!                    └──> failed
//! pending ──────────────> failed   (validation / spawn failure)
//! ```
//!
//! Terminal states are final. `started_at` and `completed_at` are each set
//! at most once, and `logs` only grows while the job is active.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::log::LogEntry;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// JobType
// ---------------------------------------------------------------------------

/// The closed set of GIS operations a job can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// File geodatabase extraction to shapefiles.
    #[serde(alias = "gdb_extraction")]
    Extraction,
    /// Enterprise geodatabase to enterprise geodatabase migration.
    #[serde(alias = "sde_conversion")]
    Migration,
    /// Schema / attribute / spatial comparison of two feature classes.
    Comparison,
}

impl JobType {
    pub const ALL: [JobType; 3] = [Self::Extraction, Self::Migration, Self::Comparison];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Migration => "migration",
            Self::Comparison => "comparison",
        }
    }

    /// Config keys that must be present (and non-empty) before a script is spawned.
    ///
    /// Deeper validation is left to the script itself.
    pub fn required_config_keys(self) -> &'static [&'static str] {
        match self {
            Self::Extraction => &["sourcePath", "outputFolder"],
            Self::Migration => &["sourceConnection", "targetConnection"],
            Self::Comparison => &["sourceFeatureClass", "targetFeatureClass"],
        }
    }

    /// Presence check of the job configuration.
    pub fn validate_config(self, config: &Value) -> Result<(), CoreError> {
        let Some(map) = config.as_object() else {
            return Err(CoreError::Validation(
                "Job configuration must be a JSON object".to_string(),
            ));
        };

        let missing: Vec<&str> = self
            .required_config_keys()
            .iter()
            .copied()
            .filter(|key| match map.get(*key) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Missing required {} configuration: {}",
                self.as_str(),
                missing.join(", ")
            )))
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extraction" | "gdb_extraction" => Ok(Self::Extraction),
            "migration" | "sde_conversion" => Ok(Self::Migration),
            "comparison" => Ok(Self::Comparison),
            other => Err(CoreError::Validation(format!("Unknown job type: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A single request to run an external GIS script.
///
/// The job type is kept as the raw submitted string so that jobs rejected
/// for an unknown type can still be reported back verbatim.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    pub config: Value,
    pub status: JobStatus,
    pub logs: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// Create a job in `pending` status.
    pub fn new(id: JobId, job_type: impl Into<String>, config: Value) -> Self {
        Self {
            id,
            job_type: job_type.into(),
            config,
            status: JobStatus::Pending,
            logs: Vec::new(),
            result: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Transition `pending -> running`, stamping `started_at`.
    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.status != JobStatus::Pending {
            return Err(self.illegal_transition(JobStatus::Running));
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Append a log entry. Rejected once the job is terminal.
    pub fn append_log(&mut self, entry: LogEntry) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Job {} is {}; logs are closed",
                self.id, self.status
            )));
        }
        self.logs.push(entry);
        Ok(())
    }

    /// Transition into `success`, appending the final entry and attaching `result`.
    pub fn succeed(&mut self, final_entry: LogEntry, result: Option<Value>) -> Result<(), CoreError> {
        if self.status != JobStatus::Running {
            return Err(self.illegal_transition(JobStatus::Success));
        }
        self.logs.push(final_entry);
        self.result = result;
        self.finish(JobStatus::Success);
        Ok(())
    }

    /// Transition into `failed` from `pending` or `running`.
    ///
    /// Any result payload is discarded; results are attached only on success.
    pub fn fail(&mut self, final_entry: LogEntry) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(self.illegal_transition(JobStatus::Failed));
        }
        self.logs.push(final_entry);
        self.result = None;
        self.finish(JobStatus::Failed);
        Ok(())
    }

    fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    fn illegal_transition(&self, to: JobStatus) -> CoreError {
        CoreError::Conflict(format!(
            "Job {} cannot move from {} to {}",
            self.id, self.status, to
        ))
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            job_type: self.job_type.clone(),
            status: self.status,
            log_count: self.logs.len(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Lightweight listing view of a [`Job`] (no logs, config, or result).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: JobId,
    pub job_type: String,
    pub status: JobStatus,
    pub log_count: usize,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
