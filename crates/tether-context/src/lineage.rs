//! Lineage tracking: inherit contexts on creation, evict on completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tether_core::ContinuationId;
use tether_runtime::ContinuationObserver;
use tracing::{trace, warn};

use crate::table::AssociationTable;

/// Observer that keeps an [`AssociationTable`] in step with the scheduler.
///
/// A created continuation inherits its trigger's context (if any); a completed
/// one is evicted. Neither operation can fail. Lineage is not retained beyond
/// the table itself, so memory is bounded by the number of live continuations
/// that have a registered ancestor.
///
/// Once [`deactivate`](Self::deactivate) returns, no further inheritance is
/// written, even by a scheduler still signalling through an observer list
/// taken before the tracker was unregistered.
pub struct LineageTracker<K, V> {
    table: Arc<AssociationTable<K, V>>,
    max_live: usize,
    over_threshold: AtomicBool,
    active: RwLock<bool>,
}

impl<K, V> LineageTracker<K, V> {
    /// Track `table`, reporting when more than `max_live` associations are live.
    #[must_use]
    pub fn new(table: Arc<AssociationTable<K, V>>, max_live: usize) -> Self {
        Self {
            table,
            max_live,
            over_threshold: AtomicBool::new(false),
            active: RwLock::new(true),
        }
    }

    /// Stop inheriting. Waits for any inheritance already in progress.
    pub fn deactivate(&self) {
        *self.active.write() = false;
    }

    /// Whether the tracker still inherits on creation.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    /// Warn once per excursion above the threshold.
    fn check_threshold(&self) {
        let live = self.table.len();
        if live > self.max_live {
            if !self.over_threshold.swap(true, Ordering::Relaxed) {
                warn!(
                    live,
                    threshold = self.max_live,
                    "live context associations above threshold, continuations may not be completing"
                );
            }
        } else if self.over_threshold.load(Ordering::Relaxed) {
            self.over_threshold.store(false, Ordering::Relaxed);
        }
    }
}

impl<K, V> ContinuationObserver for LineageTracker<K, V>
where
    K: Send + Sync,
    V: Send + Sync,
{
    fn name(&self) -> &str {
        "lineage"
    }

    fn on_create(&self, child: ContinuationId, trigger: ContinuationId) {
        let active = self.active.read();
        if !*active {
            return;
        }
        if self.table.inherit(child, trigger) {
            trace!(continuation = %child, %trigger, "context inherited");
            self.check_threshold();
        }
    }

    fn on_complete(&self, id: ContinuationId) {
        if self.table.evict(id) {
            trace!(continuation = %id, "context evicted");
            self.check_threshold();
        }
    }
}

impl<K, V> std::fmt::Debug for LineageTracker<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineageTracker")
            .field("live", &self.table.len())
            .field("max_live", &self.max_live)
            .finish()
    }
}
