//! Capture components: entry form, listing, aggregation and the shell that
//! ties them to a backend.

pub mod aggregate;
pub mod entry;
pub mod listing;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use store::{Authenticator, ObjectStore, RecordStore, StoreError};
