//! Cooperative cancellation shared by the scheduler, the feed subscription
//! and the view notifier.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation handle. Cancelling is one-way and idempotent.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Returns `true` only for the call that actually cancelled.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called (immediately if it already was)
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}
