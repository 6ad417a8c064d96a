//! Error types for `tally-core`.
//!
//! This is the failure taxonomy shared by every store trait: callers can tell
//! a missing record from a rejected input from an unreachable backend.

use thiserror::Error;

use crate::{CategoryId, EventId, StudentId};

#[derive(Debug, Error)]
pub enum Error {
  #[error("student not found: {0}")]
  StudentNotFound(StudentId),

  #[error("score category not found: {0}")]
  CategoryNotFound(CategoryId),

  #[error("score event not found: {0}")]
  EventNotFound(EventId),

  /// Malformed or policy-violating input; always caller-correctable.
  #[error("validation failed: {0}")]
  Validation(String),

  /// The persistent store could not complete the request.
  #[error("store unavailable: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }

  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::StudentNotFound(_)
        | Self::CategoryNotFound(_)
        | Self::EventNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
