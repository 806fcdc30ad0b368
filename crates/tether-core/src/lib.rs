//! # tether-core
//!
//! Foundation types shared by every tether crate:
//!
//! - **Continuation identifiers**: [`ContinuationId`], process-unique and monotonically assigned
//! - **Active continuation pointer**: [`current()`] and [`enter()`], the per-thread record of
//!   which continuation is executing right now
//! - **Logging**: [`logging::init_subscriber`] and test-side log capture

#![deny(unsafe_code)]

pub mod current;
pub mod ids;
pub mod logging;

pub use current::{EnterGuard, current, enter, is_entered, on_thread_root_exit};
pub use ids::ContinuationId;
