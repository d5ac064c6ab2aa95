use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use geohub_core::browse::BrowseError;
use geohub_core::error::CoreError;
use geohub_core::scripting::ScriptError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `geohub_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A filesystem browse failure.
    #[error(transparent)]
    Browse(#[from] BrowseError),

    /// A short-lived helper script (feature-class enumeration) failed.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => internal(msg),
            },

            // --- Browse errors ---
            AppError::Browse(err) => match err {
                BrowseError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                BrowseError::NotADirectory(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
                }
                BrowseError::PermissionDenied(_) => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN", err.to_string())
                }
                BrowseError::Io(e) => internal(&e.to_string()),
            },

            // --- Script errors ---
            AppError::Script(err) => classify_script_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal(detail: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a helper script error into an HTTP status, error code, and message.
///
/// - A script that ran and failed, or printed garbage, maps to 502.
/// - A timeout maps to 504.
/// - A missing or unlaunchable script is a server problem: 500, sanitized.
fn classify_script_error(err: &ScriptError) -> (StatusCode, &'static str, String) {
    match err {
        ScriptError::ExecutionFailed { .. } | ScriptError::InvalidOutput(_) => {
            tracing::warn!(error = %err, "Helper script failed");
            (StatusCode::BAD_GATEWAY, "SCRIPT_FAILED", err.to_string())
        }
        ScriptError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "SCRIPT_TIMEOUT", err.to_string()),
        ScriptError::NotFound(_)
        | ScriptError::PermissionDenied(_)
        | ScriptError::SpawnFailed { .. }
        | ScriptError::IoError(_) => {
            internal(&err.to_string())
        }
    }
}
