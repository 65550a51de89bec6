//! Periodic refresh timer
//!
//! Fires once immediately, then every `period`, until the shutdown token is
//! cancelled. The cancellation check happens after every tick, so no fire can
//! follow a completed `cancel()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::shutdown::ShutdownToken;

pub struct RefreshScheduler {
    handle: Option<JoinHandle<()>>,
    fires: Arc<AtomicU64>,
}

impl RefreshScheduler {
    /// Spawn the timer task. Must be called from within a tokio runtime.
    pub fn spawn<F>(period: Duration, shutdown: ShutdownToken, on_fire: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let fires = Arc::new(AtomicU64::new(0));
        let counter = fires.clone();
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            info!(period_ms = period.as_millis() as u64, "⏱️ Refresh scheduler started");
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if shutdown.is_cancelled() {
                    break;
                }

                let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(fire = n, "Refresh tick");
                on_fire();
            }

            info!(
                fires = counter.load(Ordering::Relaxed),
                "⏱️ Refresh scheduler stopped"
            );
        });

        Self {
            handle: Some(handle),
            fires,
        }
    }

    pub fn fires(&self) -> u64 {
        self.fires.load(Ordering::Relaxed)
    }

    /// Wait for the timer task to exit after cancellation
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_immediately_then_on_cadence() {
        let shutdown = ShutdownToken::new();
        let seen = Arc::new(AtomicU64::new(0));
        let sink = seen.clone();
        let period = Duration::from_millis(2_500);
        let scheduler = RefreshScheduler::spawn(period, shutdown.clone(), move || {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1, "first fire at t=0");

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.fires(), 3);

        shutdown.cancel();
        scheduler.join().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3, "no fire after cancel");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_token_never_fires() {
        let shutdown = ShutdownToken::new();
        shutdown.cancel();
        let seen = Arc::new(AtomicU64::new(0));
        let sink = seen.clone();
        let scheduler = RefreshScheduler::spawn(Duration::from_secs(1), shutdown, move || {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.join().await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
