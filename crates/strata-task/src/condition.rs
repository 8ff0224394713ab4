// SPDX-License-Identifier: MIT OR Apache-2.0
//! One-shot signalling primitive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// A one-shot condition: [`notify`](Self::notify) releases every current and
/// future [`wait`](Self::wait).
#[derive(Default)]
pub struct Condition {
    triggered: AtomicBool,
    notify: Notify,
}

impl Condition {
    /// Create an untriggered condition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the condition, waking all waiters. Idempotent.
    pub fn notify(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Returns `true` once [`notify`](Self::notify) has been called.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Wait for the condition up to `timeout`.
    ///
    /// Returns `true` when the condition fired, `false` on timeout.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_triggered() {
                return true;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Re-check after registering, otherwise a notify between the
            // check above and the registration would be lost.
            if self.is_triggered() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.is_triggered();
            }
        }
    }
}
