//! Deal Store - single owner of the deal collection
//!
//! All reads and writes of the items, sort key, direction flag and page size
//! go through one `parking_lot::Mutex`. The critical sections only touch
//! memory: no I/O, no `.await`, no other lock. Callers send notifications
//! after the guard is dropped.
//!
//! Mutations:
//! - `append`: concatenate a batch, order goes stale until the next resort
//! - `resort`: stable sort by the current `(sort_key, reversed)`
//! - `set_sort_key_and_resort` / `toggle_direction_and_resort`: key or
//!   direction change and the resort it implies, as one atomic step
//! - `grow_page` / `grow_page_if_last`: widen the visible window
//!
//! Reads go through `snapshot`, which copies the visible prefix so renderers
//! never observe a half-sorted collection.

pub mod metrics;
pub mod ordering;

pub use metrics::{StoreMetrics, StoreMetricsSummary};

use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::models::{Deal, SortKey};

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time copy of the visible page
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// Leading `min(page_size, total_count)` deals in current sorted order
    pub deals: Vec<Deal>,
    pub total_count: usize,
    pub page_size: usize,
    pub sort_key: SortKey,
    pub reversed: bool,
    /// Bumped by every state change; equal generations mean equal snapshots
    pub generation: u64,
}

impl StoreSnapshot {
    #[inline]
    pub fn row_count(&self) -> usize {
        self.deals.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Deal> {
        self.deals.get(index)
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug)]
struct StoreState {
    items: Vec<Deal>,
    sort_key: SortKey,
    reversed: bool,
    page_size: usize,
    generation: u64,
}

/// Shared, lock-protected deal collection
#[derive(Debug)]
pub struct DealStore {
    config: StoreConfig,
    state: Mutex<StoreState>,
    metrics: Arc<StoreMetrics>,
}

impl DealStore {
    pub fn new(config: StoreConfig) -> Arc<Self> {
        let page_size = config.initial_page_size.max(1);
        Arc::new(Self {
            state: Mutex::new(StoreState {
                items: Vec::with_capacity(page_size),
                sort_key: SortKey::default(),
                reversed: false,
                page_size,
                generation: 0,
            }),
            config,
            metrics: Arc::new(StoreMetrics::new()),
        })
    }

    /// Append a feed batch. Does not resort.
    pub fn append(&self, batch: Vec<Deal>) {
        let batch_len = batch.len();
        if batch_len == 0 {
            self.metrics.record_append(0);
            return;
        }

        let total = {
            let mut state = self.state.lock();
            state.items.extend(batch);
            state.generation += 1;
            state.items.len()
        };

        self.metrics.record_append(batch_len);
        trace!(batch = batch_len, total, "Deals appended");
    }

    /// Reorder in place by the current sort key and direction
    pub fn resort(&self) {
        let (elapsed, total) = {
            let mut state = self.state.lock();
            let elapsed = self.sort_locked(&mut state);
            (elapsed, state.items.len())
        };
        self.after_resort(elapsed, total);
    }

    pub fn set_sort_key(&self, key: SortKey) {
        let mut state = self.state.lock();
        if state.sort_key != key {
            state.sort_key = key;
            state.generation += 1;
        }
    }

    /// Flip the shared direction flag, returning the new value
    pub fn toggle_direction(&self) -> bool {
        let mut state = self.state.lock();
        state.reversed = !state.reversed;
        state.generation += 1;
        state.reversed
    }

    /// Change the key and resort under one critical section
    pub fn set_sort_key_and_resort(&self, key: SortKey) {
        let (elapsed, total) = {
            let mut state = self.state.lock();
            state.sort_key = key;
            let elapsed = self.sort_locked(&mut state);
            (elapsed, state.items.len())
        };
        debug!(key = key.label(), "Sort key changed");
        self.after_resort(elapsed, total);
    }

    /// Flip direction and resort under one critical section, returning the
    /// new direction
    pub fn toggle_direction_and_resort(&self) -> bool {
        let (elapsed, total, reversed) = {
            let mut state = self.state.lock();
            state.reversed = !state.reversed;
            let elapsed = self.sort_locked(&mut state);
            (elapsed, state.items.len(), state.reversed)
        };
        debug!(reversed, "Sort direction toggled");
        self.after_resort(elapsed, total);
        reversed
    }

    /// Widen the visible window by one step, returning the new page size
    pub fn grow_page(&self) -> usize {
        let page_size = {
            let mut state = self.state.lock();
            state.page_size = state.page_size.saturating_add(self.config.page_step);
            state.generation += 1;
            state.page_size
        };
        self.metrics.page_growths.fetch_add(1, Ordering::Relaxed);
        debug!(page_size, "Page grown");
        page_size
    }

    /// Grow the page only when `row` is the last row of the current page.
    ///
    /// The comparison uses the live page size, so several stale renders
    /// reporting the same row grow the page once.
    pub fn grow_page_if_last(&self, row: usize) -> Option<usize> {
        let page_size = {
            let mut state = self.state.lock();
            if Some(row) != state.page_size.checked_sub(1) {
                return None;
            }
            state.page_size = state.page_size.saturating_add(self.config.page_step);
            state.generation += 1;
            state.page_size
        };
        self.metrics.page_growths.fetch_add(1, Ordering::Relaxed);
        debug!(row, page_size, "Page grown on scroll");
        Some(page_size)
    }

    /// Copy the visible prefix and counters
    pub fn snapshot(&self) -> StoreSnapshot {
        let snapshot = {
            let state = self.state.lock();
            let visible = state.page_size.min(state.items.len());
            StoreSnapshot {
                deals: state.items[..visible].to_vec(),
                total_count: state.items.len(),
                page_size: state.page_size,
                sort_key: state.sort_key,
                reversed: state.reversed,
                generation: state.generation,
            }
        };
        self.metrics.snapshots.fetch_add(1, Ordering::Relaxed);
        snapshot
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sort_key(&self) -> SortKey {
        self.state.lock().sort_key
    }

    pub fn is_reversed(&self) -> bool {
        self.state.lock().reversed
    }

    pub fn page_size(&self) -> usize {
        self.state.lock().page_size
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }

    fn sort_locked(&self, state: &mut StoreState) -> Duration {
        let started = Instant::now();
        let StoreState {
            items,
            sort_key,
            reversed,
            ..
        } = state;
        ordering::sort_deals(
            items,
            *sort_key,
            *reversed,
            self.config.parallel_sort_threshold,
        );
        state.generation += 1;
        started.elapsed()
    }

    fn after_resort(&self, elapsed: Duration, total: usize) {
        self.metrics.record_resort(elapsed);
        trace!(total, elapsed_us = elapsed.as_micros() as u64, "Deals resorted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn store() -> Arc<DealStore> {
        DealStore::new(StoreConfig::default())
    }

    fn priced(id: i64, price: f64) -> Deal {
        Deal::new(
            id,
            Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
            "EUR/USD_TOD",
            price,
            1_000.0,
            Side::Buy,
        )
    }

    fn timed(count: i64) -> Vec<Deal> {
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        (0..count)
            .map(|i| {
                Deal::new(
                    i,
                    base + ChronoDuration::seconds(i),
                    format!("INST{}", i % 7),
                    (i % 13) as f64,
                    (i % 17) as f64 * 10.0,
                    if i % 2 == 0 { Side::Buy } else { Side::Sell },
                )
            })
            .collect()
    }

    fn prices(snapshot: &StoreSnapshot) -> Vec<f64> {
        snapshot.deals.iter().map(|d| d.price).collect()
    }

    #[test]
    fn test_defaults() {
        let store = store();
        assert!(store.is_empty());
        assert_eq!(store.sort_key(), SortKey::Date);
        assert!(!store.is_reversed());
        assert_eq!(store.page_size(), 100);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.row_count(), 0);
        assert_eq!(snapshot.total_count, 0);
    }

    #[test]
    fn test_append_does_not_resort() {
        let store = store();
        store.append(vec![priced(1, 5.0), priced(2, 1.0)]);
        store.set_sort_key(SortKey::Price);
        assert_eq!(prices(&store.snapshot()), vec![5.0, 1.0]);

        store.resort();
        assert_eq!(prices(&store.snapshot()), vec![1.0, 5.0]);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let store = store();
        let before = store.snapshot().generation;
        store.append(Vec::new());
        assert!(store.is_empty());
        assert_eq!(store.snapshot().generation, before);
        assert_eq!(store.metrics().summary().empty_batches, 1);
    }

    #[test]
    fn test_price_scenario() {
        let store = store();
        store.append(vec![priced(1, 5.0), priced(2, 1.0), priced(3, 3.0)]);

        store.set_sort_key(SortKey::Price);
        store.resort();
        assert_eq!(prices(&store.snapshot()), vec![1.0, 3.0, 5.0]);

        store.toggle_direction();
        store.resort();
        assert_eq!(prices(&store.snapshot()), vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn test_pagination_scenario() {
        let store = store();
        store.append(timed(150));
        store.resort();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.deals[0].id, 149, "newest deal first");
        assert_eq!(snapshot.row_count(), 100);
        assert_eq!(snapshot.total_count, 150);

        assert_eq!(store.grow_page_if_last(98), None);
        assert_eq!(store.grow_page_if_last(99), Some(200));
        assert_eq!(store.page_size(), 200);
        assert_eq!(store.snapshot().row_count(), 150);

        // A second report of the old last row is stale
        assert_eq!(store.grow_page_if_last(99), None);
        assert_eq!(store.page_size(), 200);
    }

    #[test]
    fn test_extreme_row_index_is_ignored() {
        let store = store();
        store.append(timed(10));
        assert_eq!(store.grow_page_if_last(usize::MAX), None);
        assert_eq!(store.page_size(), 100);
    }

    #[test]
    fn test_resort_is_idempotent() {
        let store = store();
        store.append(timed(300));
        for key in SortKey::ALL {
            store.set_sort_key_and_resort(key);
            let first = store.snapshot().deals;
            store.resort();
            assert_eq!(first, store.snapshot().deals, "{key:?}");
        }
    }

    #[test]
    fn test_every_key_and_direction_is_satisfied() {
        let store = DealStore::new(StoreConfig {
            initial_page_size: 1_000,
            ..Default::default()
        });
        store.append(timed(400));

        for key in SortKey::ALL {
            store.set_sort_key(key);
            for _ in 0..2 {
                store.resort();
                let snapshot = store.snapshot();
                assert_eq!(snapshot.row_count(), 400);
                assert!(
                    ordering::is_sorted(&snapshot.deals, key, snapshot.reversed),
                    "{key:?} reversed={}",
                    snapshot.reversed
                );
                store.toggle_direction();
            }
        }
    }

    #[test]
    fn test_toggle_round_trip() {
        let store = store();
        store.append(timed(120));
        store.set_sort_key_and_resort(SortKey::Name);
        let original = store.snapshot().deals;

        assert!(store.toggle_direction_and_resort());
        assert_ne!(store.snapshot().deals, original);
        assert!(!store.toggle_direction_and_resort());
        assert_eq!(store.snapshot().deals, original);
    }

    #[test]
    fn test_sort_key_change_keeps_direction() {
        let store = store();
        store.toggle_direction();
        store.set_sort_key_and_resort(SortKey::Amount);
        let snapshot = store.snapshot();
        assert!(snapshot.reversed);
        assert_eq!(snapshot.sort_key, SortKey::Amount);
    }

    #[test]
    fn test_page_size_never_shrinks() {
        let store = store();
        store.append(timed(10));
        let mut last = store.page_size();
        for _ in 0..5 {
            let next = store.grow_page();
            assert!(next > last);
            last = next;
            let snapshot = store.snapshot();
            assert!(snapshot.row_count() <= snapshot.total_count);
        }
        assert_eq!(store.metrics().summary().page_growths, 5);
    }
}
