//! Domain logic for the GeoHub job execution backend.
//!
//! Everything in this crate is free of HTTP concerns: job and log types,
//! stdout/stderr parsing, subprocess supervision primitives, filesystem
//! browsing, and the cancellable execution simulator.

pub mod browse;
pub mod error;
pub mod job;
pub mod log;
pub mod scripting;
pub mod simulator;
pub mod types;
