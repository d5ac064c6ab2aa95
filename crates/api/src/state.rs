use std::sync::Arc;

use geohub_core::scripting::ScriptCatalog;

use crate::config::ServerConfig;
use crate::jobs::JobRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-memory job registry and process supervisor. Owns the event bus
    /// that live job updates are published on.
    pub registry: Arc<JobRegistry>,
    /// Job type to script mapping, also used by the enumeration endpoint.
    pub catalog: Arc<ScriptCatalog>,
}
