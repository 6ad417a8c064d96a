//! Score events, the atomic unit of the ledger.
//!
//! An event is never edited. It either exists and contributes to its
//! student's total, or it has been revoked and is gone. Totals are a pure fold
//! over the events that exist.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  CategoryId, Error, EventId, Result, StudentId,
  category::{CategoryKind, ScoreCategory},
};

// ─── Stored event ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
  pub id:          EventId,
  pub student_id:  StudentId,
  pub category_id: CategoryId,
  /// Always positive; the category kind decides the sign.
  pub score:       i64,
  pub operator:    String,
  pub note:        Option<String>,
  /// Server-assigned; never changes after creation.
  pub created_at:  DateTime<Utc>,
}

/// An event joined with the category it was recorded under, as shown in a
/// student's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEventView {
  #[serde(flatten)]
  pub event:         ScoreEvent,
  pub category_name: String,
  pub kind:          CategoryKind,
}

impl ScoreEventView {
  pub fn signed_score(&self) -> i64 { self.kind.signed(self.event.score) }
}

/// Parameters for [`crate::store::LedgerStore::list_events`].
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
  pub student_id: Option<StudentId>,
  pub limit:      Option<usize>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::LedgerStore::record_event`].
/// `created_at` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewScoreEvent {
  pub student_id:  StudentId,
  pub category_id: CategoryId,
  pub score:       i64,
  pub operator:    String,
  #[serde(default)]
  pub note:        Option<String>,
}

impl NewScoreEvent {
  pub fn new(
    student_id: StudentId,
    category_id: CategoryId,
    score: i64,
    operator: impl Into<String>,
  ) -> Self {
    Self {
      student_id,
      category_id,
      score,
      operator: operator.into(),
      note: None,
    }
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    self.note = Some(note.into());
    self
  }

  /// Check this event against the rules of `category` and return the
  /// normalised form that should be written.
  pub fn validated(self, category: &ScoreCategory) -> Result<Self> {
    let (operator, note) =
      validate_entry(self.score, &self.operator, self.note, category)?;
    Ok(Self {
      student_id: self.student_id,
      category_id: self.category_id,
      score: self.score,
      operator,
      note,
    })
  }
}

/// Input to [`crate::store::LedgerStore::record_batch`]: one category,
/// magnitude and note applied to several students.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewScoreBatch {
  pub student_ids: Vec<StudentId>,
  pub category_id: CategoryId,
  pub score:       i64,
  pub operator:    String,
  #[serde(default)]
  pub note:        Option<String>,
}

impl NewScoreBatch {
  /// Validate the shared fields once against `category` and expand the batch
  /// into one event per distinct student, in the order given.
  pub fn expand(self, category: &ScoreCategory) -> Result<Vec<NewScoreEvent>> {
    if self.student_ids.is_empty() {
      return Err(Error::validation("batch must name at least one student"));
    }
    let (operator, note) =
      validate_entry(self.score, &self.operator, self.note, category)?;

    let mut seen = HashSet::new();
    Ok(
      self
        .student_ids
        .into_iter()
        .filter(|id| seen.insert(*id))
        .map(|student_id| NewScoreEvent {
          student_id,
          category_id: self.category_id,
          score: self.score,
          operator: operator.clone(),
          note: note.clone(),
        })
        .collect(),
    )
  }
}

/// Shared rules for a single entry. Returns the trimmed operator and the note
/// with blank values collapsed to `None`.
fn validate_entry(
  score: i64,
  operator: &str,
  note: Option<String>,
  category: &ScoreCategory,
) -> Result<(String, Option<String>)> {
  if score <= 0 {
    return Err(Error::validation(format!(
      "score must be a positive integer, got {score}"
    )));
  }

  let operator = operator.trim();
  if operator.is_empty() {
    return Err(Error::validation("operator must not be empty"));
  }

  let note = note
    .map(|n| n.trim().to_owned())
    .filter(|n| !n.is_empty());
  if category.requires_note && note.is_none() {
    return Err(Error::validation(format!(
      "category {:?} requires a note",
      category.name
    )));
  }

  Ok((operator.to_owned(), note))
}
