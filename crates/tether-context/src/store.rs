//! The context store: owns the association table and the registration
//! entry points.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tether_core::ContinuationId;
use tether_runtime::{ObserverId, Scheduler, Tracked, current_continuation};
use tether_settings::PropagationSettings;
use tracing::{debug, warn};

use crate::errors::{ContextError, Result};
use crate::lineage::LineageTracker;
use crate::table::{AssociationTable, RootContext, new_root};

static NEXT_STORE: AtomicU64 = AtomicU64::new(1);

type Attached<K, V> = (ObserverId, Arc<LineageTracker<K, V>>);

struct StoreInner<K, V> {
    key: u64,
    table: Arc<AssociationTable<K, V>>,
    scheduler: Scheduler,
    max_live: usize,
    observer: Mutex<Option<Attached<K, V>>>,
}

impl<K, V> StoreInner<K, V> {
    /// Deactivate before unobserving: a concurrent `create` may still hold
    /// an observer list that includes the tracker.
    fn detach(&self, (id, tracker): Attached<K, V>) {
        tracker.deactivate();
        let _ = self.scheduler.unobserve(id);
    }
}

impl<K, V> Drop for StoreInner<K, V> {
    fn drop(&mut self) {
        if let Some(attached) = self.observer.get_mut().take() {
            self.detach(attached);
        }
    }
}

/// Evicts a scope's binding when the scope ends, started or not.
struct Release<K, V> {
    table: Arc<AssociationTable<K, V>>,
    id: ContinuationId,
}

impl<K, V> Drop for Release<K, V> {
    fn drop(&mut self) {
        let _ = self.table.evict(self.id);
    }
}

/// Continuation-scoped key/value contexts for one key/value type pair.
///
/// Cheap to clone; clones share the same table. Propagation to child
/// continuations only happens between [`start`](Self::start) and
/// [`stop`](Self::stop).
pub struct ContextStore<K, V> {
    inner: Arc<StoreInner<K, V>>,
}

impl<K, V> Clone for ContextStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> ContextStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// A stopped store driven by `scheduler`, with default settings.
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self::with_settings(scheduler, &PropagationSettings::default())
    }

    /// A stopped store driven by `scheduler`.
    #[must_use]
    pub fn with_settings(scheduler: Scheduler, settings: &PropagationSettings) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                key: NEXT_STORE.fetch_add(1, Ordering::Relaxed),
                table: Arc::new(AssociationTable::new()),
                scheduler,
                max_live: settings.max_live_continuations,
                observer: Mutex::new(None),
            }),
        }
    }

    /// The scheduler whose continuations this store follows.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Begin propagating contexts to newly created continuations.
    ///
    /// Idempotent.
    pub fn start(&self) {
        let mut observer = self.inner.observer.lock();
        if observer.is_some() {
            return;
        }
        let tracker = Arc::new(LineageTracker::new(
            Arc::clone(&self.inner.table),
            self.inner.max_live,
        ));
        let id = self.inner.scheduler.observe(Arc::clone(&tracker) as _);
        *observer = Some((id, tracker));
        debug!(max_live = self.inner.max_live, "context propagation started");
    }

    /// Stop propagating and drop every association. Idempotent.
    pub fn stop(&self) {
        let Some(attached) = self.inner.observer.lock().take() else {
            return;
        };
        self.inner.detach(attached);
        let dropped = self.inner.table.len();
        self.inner.table.clear();
        debug!(dropped, "context propagation stopped");
    }

    /// Whether propagation is active.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.observer.lock().is_some()
    }

    /// Bind a fresh, empty context to the current continuation.
    ///
    /// Replaces (never merges) any context the continuation already had.
    /// Outside tracked continuations the context belongs to the thread root
    /// and is released when the thread exits.
    ///
    /// Ignored with a warning inside a tokio task the scheduler does not
    /// track: such tasks share their worker's root, so a context bound there
    /// would leak between requests. Use [`scope`](Self::scope) or
    /// [`run`](Self::run) instead.
    pub fn register_root(&self) {
        let Some(id) = current_continuation() else {
            warn!("register called in an untracked tokio task, ignored; use scope() or run()");
            return;
        };
        self.inner.table.bind(id, new_root());
        if !tether_core::is_entered() {
            let table = Arc::downgrade(&self.inner.table);
            let _ = tether_core::on_thread_root_exit(self.inner.key, move |root| {
                if let Some(table) = table.upgrade() {
                    let _ = table.evict(root);
                }
            });
        }
        debug!(continuation = %id, "context registered");
    }

    /// Run `body` in a new nested continuation bound to a fresh context.
    ///
    /// The caller's own association is left untouched. Returns what `body`
    /// returns; a panic in `body` propagates after the nested continuation
    /// has completed.
    pub fn run<R>(&self, body: impl FnOnce() -> R) -> R {
        let scope = self.inner.scheduler.scope();
        self.inner.table.bind(scope.id(), new_root());
        let _release = Release {
            table: Arc::clone(&self.inner.table),
            id: scope.id(),
        };
        debug!(continuation = %scope.id(), "context registered for scope");
        body()
    }

    /// Wrap `future` as a new continuation bound to a fresh context.
    ///
    /// The asynchronous form of [`run`](Self::run), for request handlers.
    /// The context is bound on first poll and released when the future
    /// finishes or is dropped.
    pub fn scope<F: Future>(
        &self,
        future: F,
    ) -> Tracked<impl Future<Output = F::Output> + use<K, V, F>> {
        let table = Arc::clone(&self.inner.table);
        self.inner.scheduler.track(async move {
            let id = tether_core::current();
            table.bind(id, new_root());
            let _release = Release { table, id };
            debug!(continuation = %id, "context registered for task");
            future.await
        })
    }

    /// Detach the current continuation from its context. Idempotent.
    ///
    /// Continuations already created keep the context they inherited.
    pub fn unregister(&self) {
        let Some(id) = current_continuation() else {
            return;
        };
        if self.inner.table.evict(id) {
            debug!(continuation = %id, "context unregistered");
        }
    }

    /// Number of continuations currently associated with a context.
    #[must_use]
    pub fn live_continuations(&self) -> usize {
        self.inner.table.len()
    }

    /// The context reachable from the current continuation.
    pub(crate) fn resolve(&self) -> Result<RootContext<K, V>> {
        current_continuation()
            .and_then(|id| self.inner.table.lookup(id))
            .ok_or(ContextError::Unregistered)
    }

    /// Whether two handles share one table.
    #[must_use]
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<K, V> std::fmt::Debug for ContextStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStore")
            .field("live", &self.inner.table.len())
            .field("started", &self.inner.observer.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::logging::capture_logs;
    use tether_runtime::ContinuationObserver;
    use tracing::Level;

    fn store() -> ContextStore<&'static str, i32> {
        let store = ContextStore::new(Scheduler::new());
        store.start();
        store
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let store = store();
        store.start();
        assert!(store.is_started());
        assert_eq!(store.scheduler().observer_count(), 1);

        store.stop();
        store.stop();
        assert!(!store.is_started());
        assert_eq!(store.scheduler().observer_count(), 0);
    }

    #[test]
    fn stop_clears_associations() {
        let store = store();
        store.register_root();
        assert_eq!(store.live_continuations(), 1);

        store.stop();
        assert_eq!(store.live_continuations(), 0);
        assert_eq!(store.resolve().unwrap_err(), ContextError::Unregistered);
    }

    #[test]
    fn register_replaces_existing_context() {
        let store = store();
        store.register_root();
        let first = store.resolve().unwrap();
        let _ = first.write().insert("fizz", 24);

        store.register_root();
        let second = store.resolve().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.read().is_empty());
        store.unregister();
    }

    #[test]
    fn run_leaves_caller_association_untouched() {
        let store = store();
        assert!(store.resolve().is_err());

        let inner_size = store.run(|| {
            let context = store.resolve().unwrap();
            let _ = context.write().insert("buzz", 42);
            context.read().len()
        });

        assert_eq!(inner_size, 1);
        assert!(store.resolve().is_err());
        assert_eq!(store.live_continuations(), 0);
    }

    #[test]
    fn run_replaces_inherited_context() {
        let store = store();
        store.register_root();
        let _ = store.resolve().unwrap().write().insert("outer", 1);

        let saw_outer = store.run(|| store.resolve().unwrap().read().contains_key("outer"));

        assert!(!saw_outer);
        assert!(store.resolve().unwrap().read().contains_key("outer"));
        store.unregister();
    }

    #[test]
    fn run_propagates_panics_after_cleanup() {
        let store = store();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.run(|| -> i32 { panic!("handler failed") })
        }));
        assert!(result.is_err());
        assert_eq!(store.live_continuations(), 0);
        assert!(store.resolve().is_err());
    }

    #[test]
    fn stopped_run_releases_its_binding() {
        let store: ContextStore<&'static str, i32> = ContextStore::new(Scheduler::new());
        store.run(|| assert!(store.resolve().is_ok()));
        assert_eq!(store.live_continuations(), 0);
    }

    #[tokio::test]
    async fn scope_binds_for_the_task_lifetime() {
        let store = store();
        let task = {
            let store = store.clone();
            store.clone().scope(async move {
                let _ = store.resolve().unwrap().write().insert("fizz", 24);
                store.resolve().unwrap().read().get("fizz").copied()
            })
        };
        assert_eq!(task.await, Some(24));
        assert_eq!(store.live_continuations(), 0);
        assert!(store.resolve().is_err());
    }

    #[test]
    fn unpolled_scope_binds_nothing() {
        let store = store();
        let task = store.scope(async {});
        assert_eq!(store.live_continuations(), 0);
        drop(task);
        assert_eq!(store.live_continuations(), 0);
    }

    #[test]
    fn thread_root_context_is_released_on_thread_exit() {
        let store = store();
        let worker = store.clone();
        std::thread::spawn(move || {
            worker.register_root();
            worker.register_root();
            let _ = worker.resolve().unwrap().write().insert("fizz", 24);
            assert_eq!(worker.live_continuations(), 1);
        })
        .join()
        .unwrap();
        assert_eq!(store.live_continuations(), 0);
    }

    #[test]
    fn thread_exit_after_store_drop_is_harmless() {
        std::thread::spawn(|| {
            let store = store();
            store.register_root();
            drop(store);
        })
        .join()
        .unwrap();
    }

    #[tokio::test]
    async fn untracked_task_cannot_register() {
        let (logs, _guard) = capture_logs();
        let store = store();
        let worker = store.clone();
        tokio::spawn(async move {
            worker.register_root();
            assert_eq!(worker.resolve().unwrap_err(), ContextError::Unregistered);
            worker.unregister();
        })
        .await
        .unwrap();

        assert_eq!(store.live_continuations(), 0);
        assert!(logs.has_event(Level::WARN, "untracked tokio task"));
    }

    #[tokio::test]
    async fn untracked_task_does_not_see_the_thread_root_context() {
        let store = store();
        store.register_root();
        let worker = store.clone();
        let seen = tokio::spawn(async move { worker.resolve().is_ok() })
            .await
            .unwrap();
        assert!(!seen);
        store.unregister();
    }

    #[test]
    fn stop_deactivates_the_tracker_before_unobserving() {
        let store = store();
        let tracker = {
            let attached = store.inner.observer.lock();
            Arc::clone(&(*attached).as_ref().unwrap().1)
        };
        store.stop();
        assert!(!tracker.is_active());

        store.register_root();
        let root = tether_core::current();
        tracker.on_create(ContinuationId::next(), root);
        assert_eq!(store.live_continuations(), 1);
        store.unregister();
    }

    #[test]
    fn unregister_is_idempotent() {
        let store = store();
        store.register_root();
        store.unregister();
        store.unregister();
        assert!(store.resolve().is_err());
    }

    #[test]
    fn stopped_store_does_not_propagate() {
        let store: ContextStore<&'static str, i32> = ContextStore::new(Scheduler::new());
        store.run(|| {
            assert!(store.resolve().is_ok());
            let callback = store.scheduler().bind(|| store.resolve().is_ok());
            assert!(!callback.call());
        });
    }

    #[test]
    fn dropping_last_handle_unobserves() {
        let scheduler = Scheduler::new();
        let store: ContextStore<&'static str, i32> = ContextStore::new(scheduler.clone());
        store.start();
        assert_eq!(scheduler.observer_count(), 1);
        drop(store);
        assert_eq!(scheduler.observer_count(), 0);
    }

    #[test]
    fn clones_share_one_table() {
        let store = store();
        let clone = store.clone();
        assert!(store.same_store(&clone));
        assert!(!store.same_store(&self::store()));
    }
}
