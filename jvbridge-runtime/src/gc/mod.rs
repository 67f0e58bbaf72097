//! Memory management - reference counting plus host anchors
//!
//! Design: Heap objects are `Rc`-shared and finalized when the last
//! reference goes away. The embedding host cannot hold `Rc`s across the
//! boundary, so it pins values in an anchor table instead:
//! 1. `pin` stores a strong reference under a fresh id
//! 2. `retain` / `release` adjust the anchor's own count
//! 3. At zero the strong reference is dropped, and the runtime's reference
//!    counting decides when the object dies

mod roots;

#[cfg(test)]
mod tests;

pub use roots::{AnchorId, AnchorTable};

use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;

/// Process-wide anchor counters, across all engines
static ANCHOR_STATS: Lazy<AnchorCounters> = Lazy::new(AnchorCounters::new);

struct AnchorCounters {
    pinned: AtomicUsize,
    released: AtomicUsize,
}

impl AnchorCounters {
    fn new() -> Self {
        Self {
            pinned: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }
}

#[inline]
fn record_pin() {
    ANCHOR_STATS.pinned.fetch_add(1, Ordering::Relaxed);
}

#[inline]
fn record_release() {
    ANCHOR_STATS.released.fetch_add(1, Ordering::Relaxed);
}

/// Snapshot of the anchor counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorStats {
    pub pinned: usize,
    pub released: usize,
}

impl AnchorStats {
    /// Anchors pinned and not yet released, over all engines
    pub fn outstanding(&self) -> usize {
        self.pinned.saturating_sub(self.released)
    }
}

pub fn stats() -> AnchorStats {
    AnchorStats {
        pinned: ANCHOR_STATS.pinned.load(Ordering::Relaxed),
        released: ANCHOR_STATS.released.load(Ordering::Relaxed),
    }
}
