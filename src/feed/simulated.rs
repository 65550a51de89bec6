//! In-process deal server
//!
//! Emits random deals (instrument, price, amount, side) stamped with the
//! current time, in batches of 1..=max_batch_size separated by a random pause.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{BatchCallback, DealFeed, FeedSubscription};
use crate::config::FeedConfig;
use crate::models::{Deal, Side};
use crate::shutdown::ShutdownToken;

/// Random deal source. Ids come from a counter shared with the owning feed,
/// so they stay unique across resubscriptions.
pub struct DealGenerator {
    config: FeedConfig,
    rng: ChaCha8Rng,
    next_id: Arc<AtomicI64>,
}

impl DealGenerator {
    pub fn new(config: FeedConfig) -> Self {
        Self::with_counter(config, Arc::new(AtomicI64::new(1)))
    }

    fn with_counter(config: FeedConfig, next_id: Arc<AtomicI64>) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            rng,
            next_id,
        }
    }

    /// Pause before the next batch
    pub fn next_delay(&mut self) -> Duration {
        let lo = self.config.min_interval_ms;
        let hi = self.config.max_interval_ms.max(lo);
        Duration::from_millis(self.rng.gen_range(lo..=hi))
    }

    pub fn next_batch(&mut self) -> Vec<Deal> {
        let size = self.rng.gen_range(1..=self.config.max_batch_size.max(1));
        (0..size).map(|_| self.next_deal()).collect()
    }

    pub fn next_deal(&mut self) -> Deal {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let instrument = self
            .config
            .instruments
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "UNKNOWN".to_string());

        let price = if self.config.min_price < self.config.max_price {
            self.rng
                .gen_range(self.config.min_price..self.config.max_price)
        } else {
            self.config.min_price
        };
        let amount = self.rng.gen_range(0.0..self.config.max_amount.max(1.0)).round();
        let side = if self.rng.gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        };

        Deal::new(id, Utc::now(), instrument, price, amount, side)
    }
}

/// Feed backed by `DealGenerator` on a tokio task
pub struct SimulatedFeed {
    config: FeedConfig,
    next_id: Arc<AtomicI64>,
}

impl SimulatedFeed {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

impl DealFeed for SimulatedFeed {
    fn name(&self) -> &str {
        "simulated"
    }

    fn subscribe(&self, on_batch: BatchCallback, shutdown: ShutdownToken) -> FeedSubscription {
        let mut generator = DealGenerator::with_counter(self.config.clone(), self.next_id.clone());
        info!(
            instruments = self.config.instruments.len(),
            max_batch = self.config.max_batch_size,
            seeded = self.config.seed.is_some(),
            "📡 Simulated deal feed subscribed"
        );

        let handle = tokio::spawn(async move {
            loop {
                let delay = generator.next_delay();
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                let batch = generator.next_batch();
                if shutdown.is_cancelled() {
                    break;
                }
                debug!(size = batch.len(), "Simulated batch delivered");
                on_batch(batch);
            }
            info!("📡 Simulated deal feed stopped");
        });

        FeedSubscription::new(self.name(), handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn seeded(seed: u64) -> FeedConfig {
        FeedConfig {
            seed: Some(seed),
            max_batch_size: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_batches_respect_config() {
        let config = seeded(42);
        let mut generator = DealGenerator::new(config.clone());
        for _ in 0..50 {
            let batch = generator.next_batch();
            assert!((1..=20).contains(&batch.len()));
            for deal in &batch {
                assert!(config.instruments.contains(&deal.instrument_name));
                assert!(deal.price >= config.min_price && deal.price < config.max_price);
                assert!(deal.amount >= 0.0 && deal.amount <= config.max_amount);
            }

            let delay = generator.next_delay();
            assert!(delay >= Duration::from_millis(config.min_interval_ms));
            assert!(delay <= Duration::from_millis(config.max_interval_ms));
        }
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut generator = DealGenerator::new(seeded(1));
        let ids: Vec<i64> = (0..5).flat_map(|_| generator.next_batch()).map(|d| d.id).collect();
        assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(ids[0], 1);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = DealGenerator::new(seeded(9));
        let mut b = DealGenerator::new(seeded(9));
        let key = |d: Deal| (d.instrument_name, d.price);
        let pa: Vec<(String, f64)> = a.next_batch().into_iter().map(key).collect();
        let pb: Vec<(String, f64)> = b.next_batch().into_iter().map(key).collect();
        assert_eq!(pa, pb);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_delivers_until_cancelled() {
        let feed = SimulatedFeed::new(seeded(3));
        let shutdown = ShutdownToken::new();
        let received = Arc::new(Mutex::new(0usize));
        let sink = received.clone();
        let sub = feed.subscribe(
            Arc::new(move |batch: Vec<Deal>| *sink.lock() += batch.len()),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        let delivered = *received.lock();
        assert!(delivered > 0);

        shutdown.cancel();
        sub.join().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(*received.lock(), delivered);
    }
}
