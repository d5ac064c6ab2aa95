#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use geohub_core::job::{Job, JobType};
use geohub_core::scripting::{ArgEncoding, ScriptCatalog, ScriptDescriptor};
use geohub_events::{CallbackEvent, EventBus, NoopNotifier, Notifier};
use http_body_util::BodyExt;
use tower::ServiceExt;

use geohub_api::config::ServerConfig;
use geohub_api::jobs::JobRegistry;
use geohub_api::router::build_app_router;
use geohub_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        scripts_dir: "/nonexistent/scripts".into(),
        python_bin: "python3".to_string(),
        log_batch_size: 20,
        callback_timeout_secs: 5,
        list_timeout_secs: 10,
    }
}

/// Build application state around `catalog` and `notifier`.
pub fn test_state(catalog: ScriptCatalog, notifier: Arc<dyn Notifier>) -> AppState {
    test_state_with_bus(catalog, notifier, EventBus::default())
}

/// Like [`test_state`], with a caller-supplied event bus.
pub fn test_state_with_bus(
    catalog: ScriptCatalog,
    notifier: Arc<dyn Notifier>,
    event_bus: EventBus,
) -> AppState {
    let config = test_config();
    let catalog = Arc::new(catalog);
    let registry = Arc::new(
        JobRegistry::new(Arc::clone(&catalog), notifier, Arc::new(event_bus))
            .with_log_batch_size(config.log_batch_size),
    );
    AppState {
        config: Arc::new(config),
        registry,
        catalog,
    }
}

/// Catalog whose default scripts do not exist on disk.
pub fn empty_catalog() -> ScriptCatalog {
    ScriptCatalog::new("/nonexistent/scripts", "python3")
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

/// App whose scripts are all missing and whose callbacks go nowhere.
pub fn build_default_app() -> Router {
    build_test_app(test_state(empty_catalog(), Arc::new(NoopNotifier)))
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// Write a temporary bash script with the given body.
pub fn write_script(body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(".sh")
        .tempfile()
        .expect("create temp file");
    writeln!(f, "#!/bin/bash").expect("write shebang");
    write!(f, "{body}").expect("write body");
    f.flush().expect("flush script");
    f
}

/// Descriptor running `script` through bash with the config as `$1`.
pub fn bash(script: &tempfile::NamedTempFile) -> ScriptDescriptor {
    ScriptDescriptor::interpreted("bash", script.path(), ArgEncoding::Argument)
}

/// Catalog running `script` for every job type.
pub fn catalog_for(script: &tempfile::NamedTempFile) -> ScriptCatalog {
    JobType::ALL
        .into_iter()
        .fold(empty_catalog(), |catalog, job_type| {
            catalog.with_descriptor(job_type, bash(script))
        })
}

/// A config that passes validation for extraction jobs.
pub fn extraction_config() -> serde_json::Value {
    serde_json::json!({
        "sourcePath": "/data/City.gdb",
        "outputFolder": "/data/out",
    })
}

// ---------------------------------------------------------------------------
// Registry helpers
// ---------------------------------------------------------------------------

/// Poll until the job reaches a terminal status.
pub async fn wait_for_terminal(registry: &JobRegistry, job_id: &str) -> Job {
    for _ in 0..500 {
        if let Some(job) = registry.get(job_id) {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish in time");
}

/// Notifier that records every event it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(String, CallbackEvent)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(String, CallbackEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// Wait until at least `count` events have been recorded.
    pub async fn wait_for(&self, count: usize) -> Vec<(String, CallbackEvent)> {
        for _ in 0..500 {
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} callback events, got {}", self.events().len());
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, url: &str, event: CallbackEvent) {
        self.events.lock().unwrap().push((url.to_string(), event));
    }
}

/// Notifier that panics on every call.
pub struct PanickingNotifier;

#[async_trait]
impl Notifier for PanickingNotifier {
    async fn notify(&self, _url: &str, _event: CallbackEvent) {
        panic!("callback endpoint exploded");
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Collect a response body into JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body into a string.
pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}
