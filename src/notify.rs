//! Notification delivery boundary.
//!
//! Transports (chat clients, webhooks) live outside this crate; the
//! orchestrator hands a rendered [`NotificationPayload`] to whatever
//! [`Notifier`] it was constructed with. Payloads are ephemeral; nothing
//! here is persisted beyond the dedup cache's bookkeeping.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::task::TaskDefinition;

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Formatter output, the message text.
    pub text: String,
    /// Screenshot captured during the fetch, when available.
    pub screenshot: Option<PathBuf>,
}

/// A pluggable notification transport.
pub trait Notifier: Send + Sync {
    /// Deliver a payload for a task.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::Notify`] on delivery failure. A failed
    /// delivery leaves the task's baseline untouched, so the same change is
    /// re-detected and re-sent on the next tick.
    fn notify(
        &self,
        task: &TaskDefinition,
        payload: &NotificationPayload,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
