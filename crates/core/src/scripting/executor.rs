//! Script invocation descriptors and shared types.
//!
//! A [`ScriptDescriptor`] says how to launch one external script: which
//! interpreter (if any), which file, and how the job configuration is
//! handed over ([`ArgEncoding`]).

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;

/// How the serialized job configuration reaches the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgEncoding {
    /// Config JSON passed as the single positional argument (`argv[1]`).
    Argument,
    /// Config JSON piped to stdin; no positional argument.
    Stdin,
}

/// Everything needed to launch one external script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDescriptor {
    /// Interpreter to run the script with; `None` executes the file directly.
    pub program: Option<String>,
    /// Path of the script file.
    pub script_path: PathBuf,
    pub encoding: ArgEncoding,
}

impl ScriptDescriptor {
    /// A script run through an interpreter (`python3 script.py ...`).
    pub fn interpreted(
        program: impl Into<String>,
        script_path: impl Into<PathBuf>,
        encoding: ArgEncoding,
    ) -> Self {
        Self {
            program: Some(program.into()),
            script_path: script_path.into(),
            encoding,
        }
    }

    /// A file executed directly; it must carry execute permissions.
    pub fn executable(script_path: impl Into<PathBuf>, encoding: ArgEncoding) -> Self {
        Self {
            program: None,
            script_path: script_path.into(),
            encoding,
        }
    }

    /// Check that the script can be launched.
    ///
    /// Fails with [`ScriptError::NotFound`] when the file is missing and with
    /// [`ScriptError::PermissionDenied`] when a directly-executed file lacks
    /// execute permissions.
    pub async fn verify(&self) -> Result<(), ScriptError> {
        let metadata = tokio::fs::metadata(&self.script_path)
            .await
            .map_err(|_| ScriptError::NotFound(self.display_path()))?;

        if !metadata.is_file() {
            return Err(ScriptError::NotFound(self.display_path()));
        }

        #[cfg(unix)]
        if self.program.is_none() {
            use std::os::unix::fs::PermissionsExt;

            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                return Err(ScriptError::PermissionDenied(format!(
                    "{} is not executable (mode {mode:#o})",
                    self.display_path()
                )));
            }
        }

        Ok(())
    }

    /// Build the command for a run with the given payload.
    ///
    /// For [`ArgEncoding::Argument`] the payload is appended as the last
    /// argument; stdin is piped only for [`ArgEncoding::Stdin`].
    pub fn command(&self, payload: &Value) -> Command {
        self.command_with_arg(&payload.to_string())
    }

    /// Build the command with a raw trailing argument (used for listing
    /// scripts that take a plain path rather than JSON).
    pub fn command_with_arg(&self, arg: &str) -> Command {
        let mut cmd = match &self.program {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.arg(&self.script_path);
                cmd
            }
            None => Command::new(&self.script_path),
        };

        match self.encoding {
            ArgEncoding::Argument => {
                cmd.arg(arg);
                cmd.stdin(Stdio::null());
            }
            ArgEncoding::Stdin => {
                cmd.stdin(Stdio::piped());
            }
        }

        cmd
    }

    /// The program handed to the OS: the interpreter, or the script itself.
    pub fn launcher(&self) -> String {
        self.program.clone().unwrap_or_else(|| self.display_path())
    }

    pub fn display_path(&self) -> String {
        self.script_path.display().to_string()
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}

/// Captured output from a run-to-completion script execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutput {
    /// Complete stdout captured from the process.
    pub stdout: String,
    /// Complete stderr captured from the process.
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Stdout parsed as JSON, or `None` if stdout is not valid JSON.
    pub parsed_output: Option<Value>,
}

/// Errors that can occur while launching or running a script.
#[derive(Debug)]
pub enum ScriptError {
    /// The script file was not found at the specified path.
    NotFound(String),
    /// The script file exists but lacks execute permissions.
    PermissionDenied(String),
    /// The script exceeded its configured timeout and was killed.
    Timeout {
        /// Elapsed wall-clock time before the process was killed.
        elapsed_ms: u64,
    },
    /// The script ran but exited with a non-zero exit code.
    ExecutionFailed {
        /// Process exit code.
        exit_code: i32,
        /// Captured stderr output.
        stderr: String,
    },
    /// The script exited cleanly but its output could not be interpreted.
    InvalidOutput(String),
    /// The OS refused to start the process (missing interpreter, bad format).
    SpawnFailed {
        program: String,
        script: String,
        source: std::io::Error,
    },
    /// An I/O error occurred while spawning or communicating with the process.
    IoError(std::io::Error),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "Script not found: {path}"),
            Self::PermissionDenied(path) => write!(f, "Permission denied: {path}"),
            Self::Timeout { elapsed_ms } => {
                write!(f, "Script timed out after {elapsed_ms}ms")
            }
            Self::ExecutionFailed { exit_code, stderr } => {
                write!(f, "Script failed with exit code {exit_code}: {stderr}")
            }
            Self::InvalidOutput(msg) => write!(f, "Invalid script output: {msg}"),
            Self::SpawnFailed {
                program,
                script,
                source,
            } => write!(f, "Failed to start {program} for script {script}: {source}"),
            Self::IoError(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) | Self::SpawnFailed { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
