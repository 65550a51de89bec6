//! Comparator selection for the deal list.
//!
//! Forward orderings per key:
//! - Date: newest first
//! - Name, Price, Amount: ascending
//! - Side: buy before sell
//!
//! The direction flag flips whichever forward ordering is active.

use rayon::prelude::*;
use std::cmp::Ordering;

use crate::models::{Deal, SortKey};

/// Non-reversed ordering for `key`
#[inline]
pub fn forward_cmp(key: SortKey, a: &Deal, b: &Deal) -> Ordering {
    match key {
        SortKey::Date => b.timestamp.cmp(&a.timestamp),
        SortKey::Name => a.instrument_name.cmp(&b.instrument_name),
        SortKey::Price => a.price.total_cmp(&b.price),
        SortKey::Amount => a.amount.total_cmp(&b.amount),
        SortKey::Side => b.side.cmp(&a.side),
    }
}

/// Effective ordering for `(key, reversed)`
#[inline]
pub fn compare(key: SortKey, reversed: bool, a: &Deal, b: &Deal) -> Ordering {
    let ord = forward_cmp(key, a, b);
    if reversed {
        ord.reverse()
    } else {
        ord
    }
}

/// Stable in-place sort. Collections of at least `parallel_threshold` items
/// use rayon's stable parallel merge sort.
pub fn sort_deals(items: &mut [Deal], key: SortKey, reversed: bool, parallel_threshold: usize) {
    if items.len() >= parallel_threshold {
        items.par_sort_by(|a, b| compare(key, reversed, a, b));
    } else {
        items.sort_by(|a, b| compare(key, reversed, a, b));
    }
}

/// Pairwise check that `items` satisfies the `(key, reversed)` ordering
pub fn is_sorted(items: &[Deal], key: SortKey, reversed: bool) -> bool {
    items
        .windows(2)
        .all(|w| compare(key, reversed, &w[0], &w[1]) != Ordering::Greater)
}
