//! Point-in-time snapshots of the standings.
//!
//! A snapshot batch is the set of rows sharing one `snapshot_time`. Rows are
//! written once and never updated; they copy the student's name rather than
//! referencing the roster so they stay readable if the roster changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
  pub id:            i64,
  pub snapshot_time: DateTime<Utc>,
  pub title:         String,
  pub month:         String,
  pub student_name:  String,
  pub add_score:     i64,
  pub minus_score:   i64,
  pub total_score:   i64,
  pub created_at:    DateTime<Utc>,
}

/// One entry of [`crate::store::SnapshotStore::list_snapshot_batches`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBatch {
  pub snapshot_time: DateTime<Utc>,
  pub title:         String,
  pub month:         String,
}

/// The `YYYY-MM` tag of an instant.
pub fn month_tag(at: DateTime<Utc>) -> String { at.format("%Y-%m").to_string() }

pub fn normalize_title(title: &str) -> Result<String> {
  let trimmed = title.trim();
  if trimmed.is_empty() {
    return Err(Error::validation("snapshot title must not be empty"));
  }
  Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn month_tag_is_year_and_month() {
    let at = Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 59).unwrap();
    assert_eq!(month_tag(at), "2026-03");
  }

  #[test]
  fn empty_title_rejected() {
    assert!(matches!(normalize_title(""), Err(Error::Validation(_))));
    assert_eq!(normalize_title(" week1 ").unwrap(), "week1");
  }
}
