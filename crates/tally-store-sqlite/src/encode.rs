//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with microsecond precision,
//! so lexicographic order is chronological order and two snapshot batches
//! never share a key. Enumerations are stored as their lowercase names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tally_core::{
  audit::{ActionKind, LogEntry},
  category::{CategoryKind, ScoreCategory},
  event::{ScoreEvent, ScoreEventView},
  session::{IpSession, Role},
  snapshot::{SnapshotBatch, SnapshotRow},
  student::{Student, StudentTotals},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 as well as the `YYYY-MM-DD HH:MM:SS` form SQLite's
/// `CURRENT_TIMESTAMP` produces, interpreted as UTC.
pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .or_else(|_| {
      NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
    })
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn encode_kind(kind: CategoryKind) -> &'static str { kind.into() }

pub fn encode_action(action: ActionKind) -> &'static str { action.into() }

pub fn encode_role(role: Role) -> &'static str { role.into() }

fn decode_enum<T: FromStr>(column: &'static str, value: &str) -> Result<T> {
  value.parse().map_err(|_| Error::UnknownValue {
    column,
    value: value.to_owned(),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const STUDENT_COLUMNS: &str = "id, name";

pub fn student_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
  Ok(Student {
    id:   row.get(0)?,
    name: row.get(1)?,
  })
}

pub const CATEGORY_COLUMNS: &str = "id, name, type, weight, requires_note";

/// Raw values read from a `score_categories` row.
pub struct RawCategory {
  pub id:            i64,
  pub name:          String,
  pub kind:          String,
  pub weight:        f64,
  pub requires_note: bool,
}

impl RawCategory {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      name:          row.get(1)?,
      kind:          row.get(2)?,
      weight:        row.get(3)?,
      requires_note: row.get(4)?,
    })
  }

  pub fn into_category(self) -> Result<ScoreCategory> {
    Ok(ScoreCategory {
      id:            self.id,
      name:          self.name,
      kind:          decode_enum("score_categories.type", &self.kind)?,
      weight:        self.weight,
      requires_note: self.requires_note,
    })
  }
}

/// Raw values read from a `score_records` row joined with its category.
pub struct RawEventView {
  pub id:            i64,
  pub student_id:    i64,
  pub category_id:   i64,
  pub score:         i64,
  pub operator:      String,
  pub note:          Option<String>,
  pub created_at:    String,
  pub category_name: String,
  pub kind:          String,
}

pub const EVENT_VIEW_COLUMNS: &str = "r.id, r.student_id, r.category_id, r.score, \
   r.operator, r.note, r.created_at, c.name, c.type";

impl RawEventView {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      student_id:    row.get(1)?,
      category_id:   row.get(2)?,
      score:         row.get(3)?,
      operator:      row.get(4)?,
      note:          row.get(5)?,
      created_at:    row.get(6)?,
      category_name: row.get(7)?,
      kind:          row.get(8)?,
    })
  }

  pub fn into_view(self) -> Result<ScoreEventView> {
    Ok(ScoreEventView {
      event:         ScoreEvent {
        id:          self.id,
        student_id:  self.student_id,
        category_id: self.category_id,
        score:       self.score,
        operator:    self.operator,
        note:        self.note,
        created_at:  decode_dt(&self.created_at)?,
      },
      category_name: self.category_name,
      kind:          decode_enum("score_categories.type", &self.kind)?,
    })
  }
}

/// Raw per-student sums, before the net total is derived.
pub struct RawTotals {
  pub student_id:     i64,
  pub name:           String,
  pub add_total:      i64,
  pub subtract_total: i64,
}

impl RawTotals {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:     row.get(0)?,
      name:           row.get(1)?,
      add_total:      row.get(2)?,
      subtract_total: row.get(3)?,
    })
  }

  pub fn into_totals(self) -> StudentTotals {
    StudentTotals::new(self.student_id, self.name, self.add_total, self.subtract_total)
  }
}

pub const LOG_COLUMNS: &str = "id, student_id, action_type, score_change, operator, \
   category_name, note, ip_address, user_agent, created_at";

/// NULL text columns from older deployments read as empty strings.
pub struct RawLogEntry {
  pub id:            i64,
  pub student_id:    i64,
  pub action:        String,
  pub score_change:  i64,
  pub operator:      String,
  pub category_name: String,
  pub note:          Option<String>,
  pub ip_address:    String,
  pub user_agent:    String,
  pub created_at:    String,
}

impl RawLogEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      student_id:    row.get(1)?,
      action:        row.get(2)?,
      score_change:  row.get(3)?,
      operator:      row.get::<_, Option<String>>(4)?.unwrap_or_default(),
      category_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
      note:          row.get(6)?,
      ip_address:    row.get::<_, Option<String>>(7)?.unwrap_or_default(),
      user_agent:    row.get::<_, Option<String>>(8)?.unwrap_or_default(),
      created_at:    row.get(9)?,
    })
  }

  pub fn into_entry(self) -> Result<LogEntry> {
    Ok(LogEntry {
      id:            self.id,
      student_id:    self.student_id,
      action:        decode_enum("operation_logs.action_type", &self.action)?,
      score_change:  self.score_change,
      operator:      self.operator,
      category_name: self.category_name,
      note:          self.note,
      ip_address:    self.ip_address,
      user_agent:    self.user_agent,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub const SNAPSHOT_COLUMNS: &str = "id, snapshot_time, title, month, student_name, \
   add_score, minus_score, total_score, created_at";

pub struct RawSnapshotRow {
  pub id:            i64,
  pub snapshot_time: String,
  pub title:         String,
  pub month:         String,
  pub student_name:  String,
  pub add_score:     i64,
  pub minus_score:   i64,
  pub total_score:   i64,
  pub created_at:    String,
}

impl RawSnapshotRow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      snapshot_time: row.get(1)?,
      title:         row.get(2)?,
      month:         row.get(3)?,
      student_name:  row.get(4)?,
      add_score:     row.get(5)?,
      minus_score:   row.get(6)?,
      total_score:   row.get(7)?,
      created_at:    row.get(8)?,
    })
  }

  pub fn into_row(self) -> Result<SnapshotRow> {
    Ok(SnapshotRow {
      id:            self.id,
      snapshot_time: decode_dt(&self.snapshot_time)?,
      title:         self.title,
      month:         self.month,
      student_name:  self.student_name,
      add_score:     self.add_score,
      minus_score:   self.minus_score,
      total_score:   self.total_score,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawSnapshotBatch {
  pub snapshot_time: String,
  pub title:         String,
  pub month:         String,
}

impl RawSnapshotBatch {
  pub fn into_batch(self) -> Result<SnapshotBatch> {
    Ok(SnapshotBatch {
      snapshot_time: decode_dt(&self.snapshot_time)?,
      title:         self.title,
      month:         self.month,
    })
  }
}

pub struct RawSession {
  pub ip:       String,
  pub username: String,
  pub role:     String,
  pub expires:  String,
}

impl RawSession {
  pub fn into_session(self) -> Result<IpSession> {
    Ok(IpSession {
      ip:       self.ip,
      username: self.username,
      role:     decode_enum("ip_sessions.role", &self.role)?,
      expires:  decode_dt(&self.expires)?,
    })
  }
}
