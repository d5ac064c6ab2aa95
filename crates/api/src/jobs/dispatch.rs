//! Per-job callback queue.
//!
//! Notifications for one job are delivered by a single detached task in the
//! order they were queued, so a slow endpoint never blocks the supervisor and
//! a `running` batch can never arrive after the final status.

use std::sync::Arc;

use geohub_events::{CallbackEvent, Notifier};
use tokio::sync::mpsc;

pub(crate) struct CallbackDispatcher {
    tx: Option<mpsc::UnboundedSender<CallbackEvent>>,
}

impl CallbackDispatcher {
    /// Start a relay task for `url`. Without a URL every event is dropped.
    pub(crate) fn spawn(notifier: Arc<dyn Notifier>, url: Option<String>) -> Self {
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
            return Self { tx: None };
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<CallbackEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                notifier.notify(&url, event).await;
            }
        });
        Self { tx: Some(tx) }
    }

    pub(crate) fn send(&self, event: CallbackEvent) {
        if let Some(tx) = &self.tx {
            // The relay task only stops once every sender is gone.
            let _ = tx.send(event);
        }
    }
}
