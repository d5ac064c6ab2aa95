pub mod health;
pub mod jobs;
pub mod tools;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                        list, submit
/// /jobs/{id}                   get
/// /jobs/{id}/events            server-sent events
///
/// /simulations                 run a canned or custom simulation (POST)
/// /browse                      list a server directory (POST)
/// /feature-classes             enumerate a geodatabase (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .merge(tools::router())
}
