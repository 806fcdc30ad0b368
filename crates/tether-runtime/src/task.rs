//! Continuation wrappers: futures, callbacks and synchronous scopes.
//!
//! Each wrapper owns a [`Completion`]. Completion is signalled when the
//! wrapper finishes its work or, failing that, when it is dropped. A task that
//! is aborted, a callback that is never invoked, or a scope that unwinds still
//! reports completion exactly once.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use tether_core::{ContinuationId, EnterGuard};

use crate::scheduler::Scheduler;

/// Signals completion of one continuation when dropped.
struct Completion {
    id: ContinuationId,
    scheduler: Scheduler,
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.scheduler.complete(self.id);
    }
}

pin_project! {
    /// A future running as its own continuation.
    ///
    /// Every poll enters the continuation, so code inside the future (and any
    /// continuation it creates) sees it as current. Created by
    /// [`Scheduler::track`] and [`Scheduler::spawn`].
    #[must_use = "futures do nothing unless polled"]
    pub struct Tracked<F> {
        #[pin]
        future: F,
        id: ContinuationId,
        completion: Option<Completion>,
    }
}

impl<F> Tracked<F> {
    pub(crate) fn new(scheduler: Scheduler, id: ContinuationId, future: F) -> Self {
        Self {
            future,
            id,
            completion: Some(Completion { id, scheduler }),
        }
    }

    /// The continuation this future runs as.
    #[must_use]
    pub fn id(&self) -> ContinuationId {
        self.id
    }
}

impl<F: Future> Future for Tracked<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.project();
        let _enter = tether_core::enter(*this.id);
        let output = ready!(this.future.poll(cx));
        // Signal before the poller sees Ready, so a joined task is already evicted.
        drop(this.completion.take());
        Poll::Ready(output)
    }
}

impl<F> std::fmt::Debug for Tracked<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracked")
            .field("id", &self.id)
            .field("completed", &self.completion.is_none())
            .finish_non_exhaustive()
    }
}

/// A callback running as its own continuation.
///
/// Created by [`Scheduler::bind`]. Suitable for timer firings and I/O
/// completion handlers that are invoked at most once.
#[must_use = "dropping an uncalled callback completes its continuation without running it"]
pub struct BoundFn<F> {
    callback: F,
    completion: Completion,
}

impl<F> BoundFn<F> {
    pub(crate) fn new(scheduler: Scheduler, id: ContinuationId, callback: F) -> Self {
        Self {
            callback,
            completion: Completion { id, scheduler },
        }
    }

    /// The continuation the callback runs as.
    #[must_use]
    pub fn id(&self) -> ContinuationId {
        self.completion.id
    }

    /// Invoke the callback inside its continuation, then complete it.
    pub fn call<R>(self) -> R
    where
        F: FnOnce() -> R,
    {
        let Self {
            callback,
            completion,
        } = self;
        let _enter = tether_core::enter(completion.id);
        let output = callback();
        drop(completion);
        output
    }
}

impl<F> std::fmt::Debug for BoundFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundFn")
            .field("id", &self.completion.id)
            .finish_non_exhaustive()
    }
}

/// A synchronous nested continuation, current until the guard is dropped.
///
/// Created by [`Scheduler::scope`]. Dropping the guard restores the previous
/// continuation and then signals completion, including during unwinding.
#[must_use = "the scope completes as soon as the guard is dropped"]
pub struct ScopeGuard {
    _enter: EnterGuard,
    completion: Completion,
}

impl ScopeGuard {
    pub(crate) fn new(scheduler: Scheduler, id: ContinuationId) -> Self {
        Self {
            _enter: tether_core::enter(id),
            completion: Completion { id, scheduler },
        }
    }

    /// The continuation this scope runs as.
    #[must_use]
    pub fn id(&self) -> ContinuationId {
        self.completion.id
    }
}

impl std::fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("id", &self.completion.id)
            .finish_non_exhaustive()
    }
}
