use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory holding the GIS scripts (default: `./scripts`).
    pub scripts_dir: PathBuf,
    /// Interpreter used to run the scripts (default: `python3`).
    pub python_bin: String,
    /// Log entries accumulated before a `running` callback is pushed (default: `20`).
    pub log_batch_size: usize,
    /// Per-attempt timeout for callback POSTs in seconds (default: `30`).
    pub callback_timeout_secs: u64,
    /// Timeout for the feature-class enumeration script in seconds (default: `60`).
    pub list_timeout_secs: u64,
}

/// A configuration variable that is set but cannot be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{name} must be a valid {expected}, got '{value}'")]
pub struct ConfigError {
    pub name: &'static str,
    pub expected: &'static str,
    pub value: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `8000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SCRIPTS_DIR`           | `./scripts`             |
    /// | `PYTHON_BIN`            | `python3`               |
    /// | `LOG_BATCH_SIZE`        | `20`                    |
    /// | `CALLBACK_TIMEOUT_SECS` | `30`                    |
    /// | `LIST_TIMEOUT_SECS`     | `60`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let log_batch_size: usize = parse_var("LOG_BATCH_SIZE", 20, "positive integer")?;
        if log_batch_size == 0 {
            return Err(ConfigError {
                name: "LOG_BATCH_SIZE",
                expected: "positive integer",
                value: "0".into(),
            });
        }

        Ok(Self {
            host,
            port: parse_var("PORT", 8000, "u16")?,
            cors_origins,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30, "u64")?,
            scripts_dir: std::env::var("SCRIPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./scripts")),
            python_bin: std::env::var("PYTHON_BIN").unwrap_or_else(|_| "python3".into()),
            log_batch_size,
            callback_timeout_secs: parse_var("CALLBACK_TIMEOUT_SECS", 30, "u64")?,
            list_timeout_secs: parse_var("LIST_TIMEOUT_SECS", 60, "u64")?,
        })
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }
}

fn parse_var<T: FromStr>(
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError {
            name,
            expected,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
