//! SQLite backend for the Tally class scoring ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every multi-row write runs inside one
//! transaction.

mod audit;
mod encode;
mod schema;
mod sessions;
mod settings;
mod snapshots;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
