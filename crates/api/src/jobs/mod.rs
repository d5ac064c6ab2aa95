//! Job execution: registry, per-job supervisor, and callback dispatch.

mod dispatch;
pub mod registry;
mod supervisor;

pub use registry::{JobRegistry, SubmitJob, SubmitOutcome, DEFAULT_LOG_BATCH_SIZE};
