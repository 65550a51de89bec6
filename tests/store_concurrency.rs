//! Store behaviour under concurrent writers and readers

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};

use deals_viewer::config::StoreConfig;
use deals_viewer::models::{Deal, Side, SortKey};
use deals_viewer::store::{ordering::is_sorted, DealStore};

const WRITERS: usize = 8;
const BATCHES_PER_WRITER: usize = 50;
const BATCH_SIZE: usize = 20;

/// Page covering every deal a test appends, so sortedness checks see all of them
fn whole_store() -> std::sync::Arc<DealStore> {
    DealStore::new(StoreConfig {
        initial_page_size: WRITERS * BATCHES_PER_WRITER * BATCH_SIZE,
        ..Default::default()
    })
}

fn batch(writer: usize, batch: usize) -> Vec<Deal> {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    (0..BATCH_SIZE)
        .map(|i| {
            let id = ((writer * BATCHES_PER_WRITER + batch) * BATCH_SIZE + i) as i64;
            let side = if id % 3 == 0 { Side::Buy } else { Side::Sell };
            Deal::new(
                id,
                base + ChronoDuration::seconds((id * 7919) % 86_400),
                format!("PAIR{}/RUB_TOM", id % 11),
                60.0 + (id % 997) as f64 / 100.0,
                ((id * 31) % 1_000_000) as f64,
                side,
            )
        })
        .collect()
}

#[test]
fn test_concurrent_appends_lose_nothing() {
    let store = whole_store();

    std::thread::scope(|s| {
        for writer in 0..WRITERS {
            let store = &store;
            s.spawn(move || {
                for b in 0..BATCHES_PER_WRITER {
                    store.append(batch(writer, b));
                }
            });
        }
    });

    store.resort();
    assert_eq!(store.len(), WRITERS * BATCHES_PER_WRITER * BATCH_SIZE);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.row_count(), snapshot.total_count);
    assert!(is_sorted(&snapshot.deals, SortKey::Date, false));

    let summary = store.metrics().summary();
    assert_eq!(summary.batches_appended as usize, WRITERS * BATCHES_PER_WRITER);
}

#[test]
fn test_readers_see_consistent_snapshots_during_writes() {
    let store = whole_store();
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        for writer in 0..4 {
            let store = &store;
            s.spawn(move || {
                for b in 0..BATCHES_PER_WRITER {
                    store.append(batch(writer, b));
                    if b % 10 == 0 {
                        store.set_sort_key_and_resort(SortKey::Price);
                    }
                }
            });
        }

        let store = &store;
        let done = &done;
        let reader = s.spawn(move || {
            let mut last_total = 0;
            while !done.load(Ordering::Acquire) {
                let snapshot = store.snapshot();
                assert_eq!(
                    snapshot.row_count(),
                    snapshot.page_size.min(snapshot.total_count)
                );
                assert!(snapshot.total_count >= last_total, "store never shrinks");
                last_total = snapshot.total_count;
            }
        });

        // Writers finish first; scope joins them before the reader stops
        while store.len() < 4 * BATCHES_PER_WRITER * BATCH_SIZE {
            std::thread::yield_now();
        }
        done.store(true, Ordering::Release);
        reader.join().unwrap();
    });

    store.resort();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.row_count(), snapshot.total_count);
    assert_eq!(snapshot.sort_key, SortKey::Price);
    assert!(is_sorted(&snapshot.deals, SortKey::Price, false));
}

#[test]
fn test_toggle_and_key_change_race_with_appends() {
    let store = whole_store();

    std::thread::scope(|s| {
        let store = &store;
        s.spawn(move || {
            for b in 0..BATCHES_PER_WRITER {
                store.append(batch(0, b));
            }
        });
        s.spawn(move || {
            for key in SortKey::ALL.iter().cycle().take(40) {
                store.set_sort_key_and_resort(*key);
                store.toggle_direction_and_resort();
            }
        });
    });

    // 40 toggles leave the flag where it started
    assert!(!store.is_reversed());
    store.resort();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.total_count, BATCHES_PER_WRITER * BATCH_SIZE);
    assert_eq!(snapshot.row_count(), snapshot.total_count);
    assert!(is_sorted(&snapshot.deals, snapshot.sort_key, snapshot.reversed));
}
