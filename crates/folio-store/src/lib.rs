//! Folio Store
//!
//! This crate holds the authoritative in-memory view of "what do we currently
//! know about page X". Each page URL maps to exactly one [`ExecutionResult`];
//! a new execution for the same URL overwrites the previous record.
//!
//! Every write ([`ResultStore::put`], [`ResultStore::clear`]) synchronously
//! notifies the registered [`ResultObserver`]s with a full snapshot of the
//! store. Observers are isolated from each other: a panicking observer is
//! logged and skipped.

mod observer;
mod store;
mod sync;
mod types;

pub use observer::{ChannelObserver, ResultObserver, Subscription};
pub use store::ResultStore;
pub use types::{ExecutionResult, ExecutionStatus, PageKey};
