//! GeoHub job execution API server library.
//!
//! Exposes the building blocks (config, state, job registry, error handling,
//! routes) so integration tests and the binary entrypoint share them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
