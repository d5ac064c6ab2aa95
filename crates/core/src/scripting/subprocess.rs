//! Subprocess spawning and output capture.
//!
//! Two modes are provided:
//!
//! - [`spawn_streaming`]: long-running job scripts. Output is delivered
//!   line by line as [`ProcessEvent`]s over a channel, followed by exactly
//!   one [`ProcessEvent::Exited`]. No timeout is applied to the script
//!   itself. Once it exits, its pipes get [`OUTPUT_DRAIN_GRACE`] to reach
//!   EOF; a background child still holding stdout open is cut off there.
//! - [`run_to_completion`]: short lookups (feature-class enumeration).
//!   Output is captured whole, bounded by a timeout.

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::executor::{ArgEncoding, ScriptDescriptor, ScriptError, ScriptOutput};

/// Maximum stdout or stderr size captured per stream in
/// [`run_to_completion`] (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long the output readers may keep running after the script exits.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, or `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// One observation from a streaming child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A complete line written to stdout.
    Stdout(String),
    /// A complete line written to stderr.
    Stderr(String),
    /// The process exited and both output streams are drained.
    /// Always the final event.
    Exited(ExitOutcome),
}

/// Spawn the script described by `descriptor` and stream its output.
///
/// Verifies the script first, so a missing file is reported as
/// [`ScriptError::NotFound`] without spawning anything. An OS-level spawn
/// failure is returned as [`ScriptError::SpawnFailed`] naming the program
/// and the script. Once spawned, every outcome (including a failed `wait`)
/// is reported through the channel.
pub async fn spawn_streaming(
    descriptor: &ScriptDescriptor,
    payload: &Value,
) -> Result<mpsc::UnboundedReceiver<ProcessEvent>, ScriptError> {
    descriptor.verify().await?;

    let mut cmd = descriptor.command(payload);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ScriptError::SpawnFailed {
        program: descriptor.launcher(),
        script: descriptor.display_path(),
        source,
    })?;

    let (tx, rx) = mpsc::unbounded_channel();

    let stdout_task = child
        .stdout
        .take()
        .map(|out| tokio::spawn(pump_lines(out, tx.clone(), ProcessEvent::Stdout)));
    let stderr_task = child
        .stderr
        .take()
        .map(|err| tokio::spawn(pump_lines(err, tx.clone(), ProcessEvent::Stderr)));

    // Readers are already draining, so a script echoing stdin cannot stall us.
    if descriptor.encoding == ArgEncoding::Stdin {
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = payload.to_string().into_bytes();
            tokio::spawn(async move {
                // The script may exit without reading stdin; that is not our error.
                let _ = stdin.write_all(&bytes).await;
            });
        }
    }

    tokio::spawn(async move {
        let status = child.wait().await;

        let deadline = tokio::time::Instant::now() + OUTPUT_DRAIN_GRACE;
        for mut task in [stdout_task, stderr_task].into_iter().flatten() {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                tracing::warn!("Script output still open after exit, closing it");
                task.abort();
            }
        }

        let outcome = match status {
            Ok(status) => ExitOutcome {
                code: status.code(),
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to wait for script process");
                let _ = tx.send(ProcessEvent::Stderr(format!(
                    "Failed to wait for process: {e}"
                )));
                ExitOutcome { code: None }
            }
        };
        let _ = tx.send(ProcessEvent::Exited(outcome));
    });

    Ok(rx)
}

/// Read `reader` to EOF, sending each line wrapped by `wrap`.
///
/// An unterminated final line is still delivered. Invalid UTF-8 is replaced
/// rather than ending the stream.
async fn pump_lines<R>(
    reader: R,
    tx: mpsc::UnboundedSender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(wrap(decode_line(&buf))).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error reading script output stream");
                break;
            }
        }
    }
}

/// Strip the `\n` (and a preceding `\r`) and decode lossily.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Run `cmd` to completion, capturing stdout/stderr and enforcing `timeout`.
///
/// `stdin_payload`, when given, is written to the child's stdin which is
/// then closed. The child is killed if the timeout fires.
pub async fn run_to_completion(
    cmd: &mut Command,
    stdin_payload: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<ScriptOutput, ScriptError> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if stdin_payload.is_some() {
        cmd.stdin(Stdio::piped());
    }

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(ScriptError::IoError)?;

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    if let (Some(bytes), Some(mut stdin)) = (stdin_payload, child.stdin.take()) {
        tokio::spawn(async move {
            let _ = stdin.write_all(&bytes).await;
        });
    }

    // On timeout `child` is dropped, which kills it (`kill_on_drop`).
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            let stdout = String::from_utf8_lossy(&stdout_bytes).into_owned();
            let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();
            let parsed_output = serde_json::from_str(stdout.trim()).ok();

            Ok(ScriptOutput {
                stdout,
                stderr,
                exit_code: status.code().unwrap_or(-1),
                duration_ms,
                parsed_output,
            })
        }
        Ok(Err(e)) => Err(ScriptError::IoError(e)),
        Err(_elapsed) => Err(ScriptError::Timeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
