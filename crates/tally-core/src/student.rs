//! Students and their derived standings.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, StudentId};

/// A member of the class roster. The display name is unique and never
/// changes once set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub id:   StudentId,
  pub name: String,
}

/// Validate and normalise a display name for a new student.
pub fn normalize_student_name(name: &str) -> Result<String> {
  let trimmed = name.trim();
  if trimmed.is_empty() {
    return Err(Error::validation("student name must not be empty"));
  }
  Ok(trimmed.to_owned())
}

/// Per-student totals, always computed by folding over score events. Never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentTotals {
  pub student_id:     StudentId,
  pub name:           String,
  pub add_total:      i64,
  pub subtract_total: i64,
  pub net_total:      i64,
}

impl StudentTotals {
  pub fn new(
    student_id: StudentId,
    name: String,
    add_total: i64,
    subtract_total: i64,
  ) -> Self {
    Self {
      student_id,
      name,
      add_total,
      subtract_total,
      net_total: add_total - subtract_total,
    }
  }
}

/// Order standings by net total descending; ties fall back to roster order.
pub fn rank_standings(rows: &mut [StudentTotals]) {
  rows.sort_by(|a, b| {
    b.net_total
      .cmp(&a.net_total)
      .then(a.student_id.cmp(&b.student_id))
  });
}
