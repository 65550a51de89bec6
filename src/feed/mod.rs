//! Feed adapters - push sources of new deals
//!
//! A feed hands batches of freshly created deals to a callback on its own
//! task, at no fixed cadence. It stops delivering once the shutdown token it
//! was subscribed with is cancelled.

pub mod channel;
pub mod simulated;

pub use channel::ChannelFeed;
pub use simulated::{DealGenerator, SimulatedFeed};

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::Deal;
use crate::shutdown::ShutdownToken;

/// Receives each non-empty batch, on whatever thread the feed runs on
pub type BatchCallback = Arc<dyn Fn(Vec<Deal>) + Send + Sync>;

pub trait DealFeed: Send + Sync {
    fn name(&self) -> &str;

    /// Start delivering batches to `on_batch` until `shutdown` is cancelled.
    /// Must be called from within a tokio runtime.
    fn subscribe(&self, on_batch: BatchCallback, shutdown: ShutdownToken) -> FeedSubscription;
}

/// Handle to a running feed task. Dropping it aborts the task.
#[derive(Debug)]
pub struct FeedSubscription {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    pub fn new(name: impl Into<String>, handle: JoinHandle<()>) -> Self {
        Self {
            name: name.into(),
            handle: Some(handle),
        }
    }

    /// A subscription that never delivers
    pub fn inert(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the feed task to observe cancellation and exit
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                debug!(feed = %self.name, "Aborting feed task");
                handle.abort();
            }
        }
    }
}
