//! Core types and trait definitions for the Tally class scoring ledger.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement the traits in [`store`] and [`session`]; the
//! validation rules and audit-entry construction live here so every backend
//! applies them identically.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod category;
pub mod error;
pub mod event;
pub mod secret;
pub mod seed;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod student;

pub use error::{Error, Result};

/// Surrogate key of a row in `students`. `0` is reserved for system-level
/// audit entries.
pub type StudentId = i64;

/// Surrogate key of a row in `score_categories`.
pub type CategoryId = i64;

/// Surrogate key of a row in `score_records`.
pub type EventId = i64;
