//! Continuation lifecycle observers.

use std::fmt;

use tether_core::ContinuationId;

/// Receives continuation lifecycle signals from a [`Scheduler`](crate::Scheduler).
///
/// Callbacks run synchronously on the signalling thread and must not block.
/// They must not register or unregister observers on the same scheduler.
pub trait ContinuationObserver: Send + Sync {
    /// Observer name, for logging.
    fn name(&self) -> &str;

    /// `child` was created while `trigger` was the current continuation.
    fn on_create(&self, child: ContinuationId, trigger: ContinuationId);

    /// `id` completed, was cancelled, or was dropped without running.
    fn on_complete(&self, id: ContinuationId);
}

/// Handle returned by [`Scheduler::observe`](crate::Scheduler::observe).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ObserverId(pub(crate) u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}
