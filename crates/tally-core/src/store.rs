//! Store traits implemented by storage backends (e.g. `tally-store-sqlite`).
//!
//! Higher layers (`tally-api`, `tally-server`) depend on these abstractions,
//! not on any concrete backend. Every method reports failures with the
//! [`crate::Error`] taxonomy so callers can map them without knowing the
//! backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  EventId, Result, StudentId,
  audit::{LogEntry, LogQuery, NewLogEntry, RequestOrigin},
  category::ScoreCategory,
  event::{EventQuery, NewScoreBatch, NewScoreEvent, ScoreEvent, ScoreEventView},
  session::SessionStore,
  settings::{SettingsPatch, SiteSettings},
  snapshot::{SnapshotBatch, SnapshotRow},
  student::{Student, StudentTotals},
};

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// The scoring ledger: roster, categories, score events and their totals.
///
/// Totals are never stored. [`LedgerStore::student_aggregates`] folds over the
/// events that exist at the time of the call.
pub trait LedgerStore: Send + Sync {
  // ── Roster & categories ─────────────────────────────────────────────────

  fn list_students(
    &self,
  ) -> impl Future<Output = Result<Vec<Student>>> + Send + '_;

  fn get_student(
    &self,
    id: StudentId,
  ) -> impl Future<Output = Result<Option<Student>>> + Send + '_;

  /// Add a student to the roster. Fails with a validation error if the name
  /// is blank or already taken.
  fn add_student(
    &self,
    name: String,
    origin: RequestOrigin,
  ) -> impl Future<Output = Result<Student>> + Send + '_;

  fn list_categories(
    &self,
  ) -> impl Future<Output = Result<Vec<ScoreCategory>>> + Send + '_;

  fn get_category(
    &self,
    id: crate::CategoryId,
  ) -> impl Future<Output = Result<Option<ScoreCategory>>> + Send + '_;

  // ── Events ──────────────────────────────────────────────────────────────

  /// Validate and append one score event together with its audit entry.
  fn record_event(
    &self,
    input: NewScoreEvent,
    origin: RequestOrigin,
  ) -> impl Future<Output = Result<EventId>> + Send + '_;

  /// Apply one category/score/note to several students. Every student id is
  /// checked before anything is written; on failure nothing is written.
  /// Returns the number of students affected.
  fn record_batch(
    &self,
    input: NewScoreBatch,
    origin: RequestOrigin,
  ) -> impl Future<Output = Result<usize>> + Send + '_;

  /// Delete an event and append the compensating audit entry. Revoking an
  /// event that no longer exists fails with [`crate::Error::EventNotFound`].
  fn revoke_event(
    &self,
    id: EventId,
    origin: RequestOrigin,
  ) -> impl Future<Output = Result<ScoreEvent>> + Send + '_;

  /// Event history, newest first.
  fn list_events<'a>(
    &'a self,
    query: &'a EventQuery,
  ) -> impl Future<Output = Result<Vec<ScoreEventView>>> + Send + 'a;

  /// Totals for every student, including those without events, ordered by
  /// net total descending.
  fn student_aggregates(
    &self,
  ) -> impl Future<Output = Result<Vec<StudentTotals>>> + Send + '_;

  /// Delete every score event and every audit entry except logins.
  /// Destructive and irreversible.
  fn reset_all(&self) -> impl Future<Output = Result<()>> + Send + '_;
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

pub trait SnapshotStore: Send + Sync {
  /// Copy the current standings of every student under one shared timestamp.
  fn capture_snapshot(
    &self,
    title: String,
    origin: RequestOrigin,
  ) -> impl Future<Output = Result<SnapshotBatch>> + Send + '_;

  /// Distinct batches, most recent first.
  fn list_snapshot_batches(
    &self,
  ) -> impl Future<Output = Result<Vec<SnapshotBatch>>> + Send + '_;

  /// Rows of one batch ordered by total descending. An unknown timestamp
  /// yields an empty list, not an error.
  fn get_snapshot_batch(
    &self,
    snapshot_time: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<SnapshotRow>>> + Send + '_;
}

// ─── Audit log ───────────────────────────────────────────────────────────────

pub trait AuditLog: Send + Sync {
  fn append_log(
    &self,
    entry: NewLogEntry,
  ) -> impl Future<Output = Result<LogEntry>> + Send + '_;

  /// Entries matching `query`, newest first.
  fn list_logs<'a>(
    &'a self,
    query: &'a LogQuery,
  ) -> impl Future<Output = Result<Vec<LogEntry>>> + Send + 'a;
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// Whether first-run setup has been completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemaStatus {
  /// `true` once the settings table holds at least one row.
  pub configured: bool,
}

pub trait SettingsStore: Send + Sync {
  fn schema_status(
    &self,
  ) -> impl Future<Output = Result<SchemaStatus>> + Send + '_;

  /// Assemble the typed settings. Fails with a validation error before setup.
  fn load_settings(
    &self,
  ) -> impl Future<Output = Result<SiteSettings>> + Send + '_;

  /// Write the initial settings. Fails with a validation error if setup has
  /// already been completed.
  fn complete_setup(
    &self,
    settings: SiteSettings,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Overwrite the keys present in `patch` and return the resulting settings.
  fn update_settings(
    &self,
    patch: SettingsPatch,
    origin: RequestOrigin,
  ) -> impl Future<Output = Result<SiteSettings>> + Send + '_;
}

/// Everything the API layer needs from a backend.
pub trait TallyStore:
  LedgerStore + SnapshotStore + AuditLog + SettingsStore + SessionStore
{
}

impl<T> TallyStore for T where
  T: LedgerStore + SnapshotStore + AuditLog + SettingsStore + SessionStore
{
}
