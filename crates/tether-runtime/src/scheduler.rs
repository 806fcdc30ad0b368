//! Continuation creation, completion and observer fan-out.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;
use tether_core::ContinuationId;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::current::current_continuation;
use crate::observer::{ContinuationObserver, ObserverId};
use crate::task::{BoundFn, ScopeGuard, Tracked};

/// Copy-on-write so signalling never holds the lock while observers run.
type ObserverList = Arc<[(ObserverId, Arc<dyn ContinuationObserver>)]>;

struct Inner {
    observers: RwLock<ObserverList>,
    next_observer: AtomicU64,
    live: AtomicUsize,
}

/// Creates continuations and signals their lifecycle to observers.
///
/// Cheap to clone; clones share observers and counters. There is no global
/// instance: the application owns one and hands it to whatever needs it.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                observers: RwLock::new(Arc::from(Vec::new())),
                next_observer: AtomicU64::new(1),
                live: AtomicUsize::new(0),
            }),
        }
    }

    /// Register an observer for all subsequent lifecycle signals.
    pub fn observe(&self, observer: Arc<dyn ContinuationObserver>) -> ObserverId {
        let id = ObserverId(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        let name = observer.name().to_owned();

        let mut observers = self.inner.observers.write();
        let mut next: Vec<_> = observers.iter().cloned().collect();
        next.push((id, observer));
        *observers = Arc::from(next);
        drop(observers);

        debug!(observer = %name, %id, "observer registered");
        id
    }

    /// Stop delivering signals to an observer. Returns `false` if unknown.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut observers = self.inner.observers.write();
        let before = observers.len();
        let next: Vec<_> = observers.iter().filter(|(oid, _)| *oid != id).cloned().collect();
        let removed = next.len() < before;
        *observers = Arc::from(next);
        drop(observers);

        if removed {
            debug!(%id, "observer unregistered");
        }
        removed
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    /// Continuations created and not yet completed.
    #[must_use]
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::Relaxed)
    }

    /// Create a child of the current continuation and signal it.
    ///
    /// The caller owns the returned identifier and must eventually pass it to
    /// [`complete`](Self::complete). Prefer [`track`](Self::track),
    /// [`bind`](Self::bind) or [`scope`](Self::scope), which do so automatically.
    ///
    /// Inside an untracked tokio task the trigger is a fresh identifier that
    /// nothing is registered under, so the child is detached.
    pub fn create(&self) -> ContinuationId {
        let trigger = current_continuation().unwrap_or_else(ContinuationId::next);
        let child = ContinuationId::next();
        let _ = self.inner.live.fetch_add(1, Ordering::Relaxed);

        for (_, observer) in self.snapshot().iter() {
            observer.on_create(child, trigger);
        }
        trace!(continuation = %child, %trigger, "continuation created");
        child
    }

    /// Signal that `id` is finished.
    pub fn complete(&self, id: ContinuationId) {
        let _ = self
            .inner
            .live
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));

        for (_, observer) in self.snapshot().iter() {
            observer.on_complete(id);
        }
        trace!(continuation = %id, "continuation completed");
    }

    /// Wrap a future as a child continuation of the current one.
    ///
    /// The continuation is created immediately, not on first poll.
    pub fn track<F: Future>(&self, future: F) -> Tracked<F> {
        Tracked::new(self.clone(), self.create(), future)
    }

    /// Spawn a future onto the ambient tokio runtime as a child continuation.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(self.track(future))
    }

    /// Wrap a callback as a child continuation of the current one.
    pub fn bind<F, R>(&self, callback: F) -> BoundFn<F>
    where
        F: FnOnce() -> R,
    {
        BoundFn::new(self.clone(), self.create(), callback)
    }

    /// Open a synchronous nested continuation, entered until the guard drops.
    pub fn scope(&self) -> ScopeGuard {
        ScopeGuard::new(self.clone(), self.create())
    }

    fn snapshot(&self) -> ObserverList {
        Arc::clone(&*self.inner.observers.read())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("observers", &self.observer_count())
            .field("live", &self.live())
            .finish()
    }
}
