//! The association table: continuation identifier to shared context.

use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tether_core::ContinuationId;

/// A registered key/value store, shared by reference across a continuation
/// subtree. Iteration follows insertion order.
pub type RootContext<K, V> = Arc<RwLock<IndexMap<K, V>>>;

/// A fresh, empty root context.
#[must_use]
pub fn new_root<K, V>() -> RootContext<K, V> {
    Arc::new(RwLock::new(IndexMap::new()))
}

/// Maps live continuations to the context they registered or inherited.
///
/// An identifier is present only while it (or an ancestor) registered a
/// context and its completion has not yet been processed. Entries share the
/// context through `Arc`; a context is freed when its last entry is evicted.
pub struct AssociationTable<K, V> {
    entries: DashMap<ContinuationId, RootContext<K, V>>,
}

impl<K, V> AssociationTable<K, V> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Point `child` at the context of `trigger`, if `trigger` has one.
    ///
    /// Overwrites any existing entry for `child`. Returns whether an entry
    /// was written.
    pub fn inherit(&self, child: ContinuationId, trigger: ContinuationId) -> bool {
        let Some(context) = self.lookup(trigger) else {
            return false;
        };
        self.bind(child, context);
        true
    }

    /// Associate `id` with `context`, replacing any previous association.
    pub fn bind(&self, id: ContinuationId, context: RootContext<K, V>) {
        let _ = self.entries.insert(id, context);
    }

    /// The context associated with `id`.
    #[must_use]
    pub fn lookup(&self, id: ContinuationId) -> Option<RootContext<K, V>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the association for `id`. Returns whether one existed.
    pub fn evict(&self, id: ContinuationId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Number of live associations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no associations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every association.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<K, V> Default for AssociationTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for AssociationTable<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssociationTable")
            .field("live", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ContinuationId {
        ContinuationId::from_raw(raw)
    }

    #[test]
    fn inherit_shares_the_same_context() {
        let table: AssociationTable<&str, i32> = AssociationTable::new();
        table.bind(id(1), new_root());

        assert!(table.inherit(id(2), id(1)));
        let _ = table.lookup(id(2)).unwrap().write().insert("fizz", 24);

        assert_eq!(table.lookup(id(1)).unwrap().read().get("fizz"), Some(&24));
        assert!(Arc::ptr_eq(&table.lookup(id(1)).unwrap(), &table.lookup(id(2)).unwrap()));
    }

    #[test]
    fn inherit_without_trigger_entry_is_a_no_op() {
        let table: AssociationTable<&str, i32> = AssociationTable::new();
        assert!(!table.inherit(id(2), id(1)));
        assert!(table.lookup(id(2)).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn inherit_twice_last_write_wins() {
        let table: AssociationTable<&str, i32> = AssociationTable::new();
        let first = new_root();
        let second = new_root();
        table.bind(id(1), Arc::clone(&first));
        table.bind(id(2), Arc::clone(&second));

        assert!(table.inherit(id(3), id(1)));
        assert!(table.inherit(id(3), id(2)));

        assert!(Arc::ptr_eq(&table.lookup(id(3)).unwrap(), &second));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn evict_is_idempotent() {
        let table: AssociationTable<&str, i32> = AssociationTable::new();
        table.bind(id(1), new_root());
        assert!(table.evict(id(1)));
        assert!(!table.evict(id(1)));
        assert!(!table.evict(id(99)));
        assert!(table.is_empty());
    }

    #[test]
    fn context_is_freed_with_last_entry() {
        let table: AssociationTable<&str, i32> = AssociationTable::new();
        let context = new_root();
        let weak = Arc::downgrade(&context);
        table.bind(id(1), context);
        assert!(table.inherit(id(2), id(1)));

        assert!(table.evict(id(1)));
        assert!(weak.upgrade().is_some());
        assert!(table.evict(id(2)));
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn clear_drops_everything() {
        let table: AssociationTable<&str, i32> = AssociationTable::new();
        table.bind(id(1), new_root());
        table.bind(id(2), new_root());
        table.clear();
        assert_eq!(table.len(), 0);
    }
}
