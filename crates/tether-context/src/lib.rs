//! # tether-context
//!
//! Request-scoped key/value storage that follows a request through every
//! task and callback it creates.
//!
//! A context is registered once, at the root of a request, with
//! [`AsyncContext::register`], [`AsyncContext::run`] or
//! [`AsyncContext::scope`]. Every continuation the scheduler creates from
//! there on inherits a reference to the same map, so a value set anywhere in
//! the tree is visible everywhere in it. Concurrent requests registered at
//! distinct roots never see each other's values.
//!
//! - [`table`]: continuation to context associations
//! - [`lineage`]: the scheduler observer that inherits and evicts entries
//! - [`store`]: lifecycle and registration entry points
//! - [`facade`]: the key/value API
//! - [`module`]: host wiring

#![deny(unsafe_code)]

pub mod errors;
pub mod facade;
pub mod lineage;
pub mod module;
pub mod store;
pub mod table;

pub use errors::{ContextError, Result};
pub use facade::{AsyncContext, Entries, Keys, Values};
pub use lineage::LineageTracker;
pub use module::{ContextModule, ModuleOptions};
pub use store::ContextStore;
pub use table::{AssociationTable, RootContext};
