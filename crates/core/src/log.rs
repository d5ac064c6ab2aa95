//! Structured job log entries and parsing of script output lines.
//!
//! Scripts report progress by writing one JSON object per stdout line:
//!
//! ```text
//! {"timestamp": "2025-01-01T12:00:00", "type": "info", "message": "Extracting: Parcels"}
//! ```
//!
//! Lines that do not match that shape are kept verbatim as `info` entries.
//! Every stderr line becomes an `error` entry.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Timestamp;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Info,
    Success,
    Warning,
    Error,
}

impl LogType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One timestamped, typed message line associated with a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(log_type: LogType, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            log_type,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogType::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogType::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogType::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogType::Error, message)
    }
}

/// Classification of a single complete stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum StdoutLine {
    /// A log entry (parsed, or the raw line wrapped as `info`).
    Log(LogEntry),
    /// A `{"result": ...}` record carrying the job's result payload.
    Result(Value),
    /// Whitespace-only line; produces nothing.
    Blank,
}

/// Loose wire shape accepted from scripts.
///
/// `timestamp` is optional and may lack a timezone (Python's
/// `datetime.now().isoformat()`), so it is parsed by hand.
#[derive(Deserialize)]
struct WireLogEntry {
    timestamp: Option<String>,
    #[serde(rename = "type")]
    log_type: LogType,
    message: String,
}

/// Interpret one complete line written by a script to stdout.
pub fn parse_stdout_line(line: &str) -> StdoutLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return StdoutLine::Blank;
    }

    if trimmed.starts_with('{') {
        if let Ok(wire) = serde_json::from_str::<WireLogEntry>(trimmed) {
            return StdoutLine::Log(LogEntry {
                timestamp: wire
                    .timestamp
                    .as_deref()
                    .and_then(parse_timestamp)
                    .unwrap_or_else(Utc::now),
                log_type: wire.log_type,
                message: wire.message,
            });
        }

        if let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(trimmed) {
            if map.len() == 1 {
                if let Some(result) = map.remove("result") {
                    return StdoutLine::Result(result);
                }
            }
        }
    }

    StdoutLine::Log(LogEntry::info(line.trim_end()))
}

/// Wrap one complete stderr line as an `error` entry, verbatim.
pub fn stderr_entry(line: &str) -> LogEntry {
    LogEntry::error(line)
}

/// Parse an ISO-8601 timestamp, assuming UTC when no offset is given.
fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
