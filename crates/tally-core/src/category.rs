//! Score categories: the named reasons a score event can be recorded for.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::CategoryId;

/// Whether events in a category raise or lower a student's total.
///
/// The string forms are the values of the `score_categories.type` column.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
pub enum CategoryKind {
  #[serde(rename = "add")]
  #[strum(serialize = "add")]
  Add,
  #[serde(rename = "minus")]
  #[strum(serialize = "minus")]
  Subtract,
}

impl CategoryKind {
  /// The signed contribution of `magnitude` points of this kind.
  pub fn signed(self, magnitude: i64) -> i64 {
    match self {
      Self::Add => magnitude,
      Self::Subtract => -magnitude,
    }
  }
}

/// A named score category. Immutable after seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCategory {
  pub id:            CategoryId,
  pub name:          String,
  pub kind:          CategoryKind,
  /// Stored for compatibility; totals never apply it.
  pub weight:        f64,
  /// Every event in this category must carry a non-empty note.
  pub requires_note: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_column_strings() {
    assert_eq!(<&'static str>::from(CategoryKind::Add), "add");
    assert_eq!(CategoryKind::Subtract.to_string(), "minus");
    assert_eq!("minus".parse::<CategoryKind>().unwrap(), CategoryKind::Subtract);
    assert!("subtract".parse::<CategoryKind>().is_err());
  }

  #[test]
  fn signed_contribution() {
    assert_eq!(CategoryKind::Add.signed(4), 4);
    assert_eq!(CategoryKind::Subtract.signed(4), -4);
  }
}
