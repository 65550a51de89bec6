//! Paginated read contract for renderers
//!
//! A `RenderSession` wraps exactly one store snapshot. Every `row_at` of a
//! redraw reads from it, so rows never shift under a renderer mid-draw even
//! while the feed and the timer keep mutating the store.

pub mod format;

pub use format::DealRow;

use crate::controller::DealsController;
use crate::models::{Deal, SortKey};
use crate::store::StoreSnapshot;

/// Two visual states of the sort direction control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionIndicator {
    Forward,
    Reversed,
}

impl DirectionIndicator {
    pub fn from_reversed(reversed: bool) -> Self {
        if reversed {
            Self::Reversed
        } else {
            Self::Forward
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Forward => "▼",
            Self::Reversed => "▲",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reversed => "reversed",
        }
    }
}

/// Section header surface: sort key labels plus direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderView {
    pub labels: [&'static str; 5],
    pub selected: usize,
    pub direction: DirectionIndicator,
}

#[derive(Debug, Clone, Default)]
pub struct RenderSession {
    snapshot: StoreSnapshot,
}

impl RenderSession {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self { snapshot }
    }

    /// `min(page_size, total_count)` at snapshot time
    #[inline]
    pub fn row_count(&self) -> usize {
        self.snapshot.row_count()
    }

    #[inline]
    pub fn row_at(&self, index: usize) -> Option<&Deal> {
        self.snapshot.get(index)
    }

    pub fn rows(&self) -> &[Deal] {
        &self.snapshot.deals
    }

    pub fn total_count(&self) -> usize {
        self.snapshot.total_count
    }

    pub fn page_size(&self) -> usize {
        self.snapshot.page_size
    }

    pub fn sort_key(&self) -> SortKey {
        self.snapshot.sort_key
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    pub fn header(&self) -> HeaderView {
        HeaderView {
            labels: SortKey::ALL.map(|k| k.label()),
            selected: self.snapshot.sort_key.index(),
            direction: DirectionIndicator::from_reversed(self.snapshot.reversed),
        }
    }

    /// Row `index` is about to be shown. On the last row of the page, ask the
    /// controller to grow the page; returns whether it grew.
    pub fn will_display(&self, index: usize, controller: &DealsController) -> bool {
        if Some(index) != self.snapshot.page_size.checked_sub(1) {
            return false;
        }
        controller.user_scrolled_near_end(index)
    }
}
