use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters updated outside the store lock
#[derive(Debug, Default)]
pub struct StoreMetrics {
    pub batches_appended: AtomicU64,
    pub deals_appended: AtomicU64,
    pub empty_batches: AtomicU64,
    pub resorts: AtomicU64,
    pub snapshots: AtomicU64,
    pub page_growths: AtomicU64,
    last_resort_us: AtomicU64,
    max_resort_us: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self, batch_len: usize) {
        if batch_len == 0 {
            self.empty_batches.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.batches_appended.fetch_add(1, Ordering::Relaxed);
        self.deals_appended
            .fetch_add(batch_len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_resort(&self, elapsed: Duration) {
        let us = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.resorts.fetch_add(1, Ordering::Relaxed);
        self.last_resort_us.store(us, Ordering::Relaxed);
        self.max_resort_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn summary(&self) -> StoreMetricsSummary {
        StoreMetricsSummary {
            batches_appended: self.batches_appended.load(Ordering::Relaxed),
            deals_appended: self.deals_appended.load(Ordering::Relaxed),
            empty_batches: self.empty_batches.load(Ordering::Relaxed),
            resorts: self.resorts.load(Ordering::Relaxed),
            snapshots: self.snapshots.load(Ordering::Relaxed),
            page_growths: self.page_growths.load(Ordering::Relaxed),
            last_resort_us: self.last_resort_us.load(Ordering::Relaxed),
            max_resort_us: self.max_resort_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreMetricsSummary {
    pub batches_appended: u64,
    pub deals_appended: u64,
    pub empty_batches: u64,
    pub resorts: u64,
    pub snapshots: u64,
    pub page_growths: u64,
    pub last_resort_us: u64,
    pub max_resort_us: u64,
}
