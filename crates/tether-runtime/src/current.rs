//! The scheduler's view of the current continuation.

use tether_core::ContinuationId;

/// The continuation the caller runs as, or `None` when it has none.
///
/// A tokio task that no [`Scheduler`](crate::Scheduler) tracks has no
/// identity of its own: it shares its worker thread's root with every other
/// untracked task polled there. Such a task is reported as `None` so that
/// nothing is registered against, read from, or inherited through that
/// shared root. Outside tokio tasks (a `main` thread, a `block_on` body, a
/// plain thread) the thread root is returned.
#[must_use]
pub fn current_continuation() -> Option<ContinuationId> {
    if !tether_core::is_entered() && tokio::task::try_id().is_some() {
        return None;
    }
    Some(tether_core::current())
}
