//! GeoHub job event plumbing.
//!
//! - [`EventBus`]: in-process publish/subscribe of [`JobEvent`]s backed by
//!   `tokio::sync::broadcast`, used to stream job progress to HTTP clients.
//! - [`relay`]: best-effort callback notifications to the external
//!   persistence endpoint.

pub mod bus;
pub mod relay;

pub use bus::{EventBus, JobEvent, JobEventKind};
pub use relay::{CallbackEvent, NoopNotifier, Notifier, WebhookNotifier};
