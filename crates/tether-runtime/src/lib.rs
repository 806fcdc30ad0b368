//! # tether-runtime
//!
//! Continuation lifecycle signalling on top of `tokio`.
//!
//! A [`Scheduler`] turns futures, callbacks and synchronous scopes into
//! *continuations*: each gets a [`ContinuationId`](tether_core::ContinuationId)
//! when it is created, runs with that identifier as the current continuation,
//! and signals completion exactly once, whether it finishes, is dropped
//! unfinished, or unwinds.
//!
//! Interested parties implement [`ContinuationObserver`] and register with
//! [`Scheduler::observe`]. They receive `on_create(child, trigger)` on the
//! parent's thread before the child can run, and `on_complete(id)` once the
//! child is done.
//!
//! Code running inside a tokio task that the scheduler does not track has no
//! continuation at all ([`current_continuation`] returns `None`): such tasks
//! share their worker thread's root, so nothing may be keyed on it.
//!
//! ```rust,ignore
//! let scheduler = Scheduler::new();
//! let handle = scheduler.spawn(async { tether_core::current() });
//! let child = handle.await?;
//! ```

#![deny(unsafe_code)]

pub mod current;
pub mod observer;
pub mod scheduler;
pub mod task;

pub use current::current_continuation;
pub use observer::{ContinuationObserver, ObserverId};
pub use scheduler::Scheduler;
pub use task::{BoundFn, ScopeGuard, Tracked};
