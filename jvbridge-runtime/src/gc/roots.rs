//! Anchor table - values pinned on behalf of the embedding host
//!
//! An anchor keeps a runtime value reachable while the host holds a handle
//! to it. The anchor count is separate from the value's own `Rc` count: the
//! host retains and releases, and the pinning reference is dropped once the
//! count reaches zero. When the object itself is finalized is still decided
//! by reference counting inside the runtime.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::logging::{log_anchor_pin, log_anchor_release};
use crate::objects::Value;

pub type AnchorId = u64;

/// Ids are unique per process, so a stale id never aliases a new anchor
static NEXT_ANCHOR: AtomicU64 = AtomicU64::new(1);

struct Anchor {
    value: Value,
    count: usize,
}

/// Root set of one engine, keyed by anchor id
pub struct AnchorTable {
    anchors: DashMap<AnchorId, Anchor>,
}

impl AnchorTable {
    pub fn new() -> Self {
        Self {
            anchors: DashMap::with_capacity(64),
        }
    }

    /// Pin a value under a fresh anchor with count one
    pub fn pin(&self, value: &Value) -> AnchorId {
        let id = NEXT_ANCHOR.fetch_add(1, Ordering::Relaxed);
        self.anchors.insert(
            id,
            Anchor {
                value: value.clone(),
                count: 1,
            },
        );
        super::record_pin();
        log_anchor_pin(id, &value.type_of().to_string());
        id
    }

    /// Add a reference to an existing anchor; false for unknown ids
    pub fn retain(&self, id: AnchorId) -> bool {
        match self.anchors.get_mut(&id) {
            Some(mut anchor) => {
                anchor.count += 1;
                true
            }
            None => false,
        }
    }

    /// Drop a reference; the anchor disappears at zero
    pub fn release(&self, id: AnchorId) -> bool {
        let emptied = {
            let Some(mut anchor) = self.anchors.get_mut(&id) else {
                return false;
            };
            anchor.count -= 1;
            anchor.count == 0
        };
        if emptied {
            self.anchors.remove(&id);
            super::record_release();
            log_anchor_release(id, self.live());
        }
        true
    }

    pub fn get(&self, id: AnchorId) -> Option<Value> {
        self.anchors.get(&id).map(|anchor| anchor.value.clone())
    }

    /// Current reference count of an anchor, zero once released
    pub fn count(&self, id: AnchorId) -> usize {
        self.anchors.get(&id).map_or(0, |anchor| anchor.count)
    }

    /// Number of live anchors
    pub fn live(&self) -> usize {
        self.anchors.len()
    }

    /// Drop every anchor (engine teardown)
    pub(crate) fn clear(&self) {
        let dropped = self.anchors.len();
        self.anchors.clear();
        for _ in 0..dropped {
            super::record_release();
        }
    }
}

impl Default for AnchorTable {
    fn default() -> Self {
        Self::new()
    }
}
