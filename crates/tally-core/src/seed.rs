//! Seed data inserted on first run.
//!
//! Rows are inserted with insert-if-absent semantics keyed on the unique
//! name, so seeding can be repeated safely.

use serde::Deserialize;

use crate::category::CategoryKind;

const DEFAULT_STUDENTS: &[&str] = &[
  "Alice", "Ben", "Chloe", "Daniel", "Emma", "Felix", "Grace", "Henry",
  "Isla", "Jack", "Kira", "Liam", "Maya", "Noah", "Olivia", "Paul",
];

const ADD_CATEGORIES: &[&str] = &[
  "Attendance",
  "Homework completed",
  "Class participation",
  "Correct answer",
  "Helping classmates",
  "Quiz excellence",
  "Project contribution",
  "Tidy desk",
  "Reading log",
  "Leadership",
];

const SUBTRACT_CATEGORIES: &[&str] = &[
  "Late arrival",
  "Missing homework",
  "Talking in class",
  "Phone use",
  "Untidy desk",
  "Disrupting class",
  "Incomplete classwork",
  "Forgot materials",
  "Uniform violation",
  "Rudeness",
];

/// The free-form categories; each event in them needs a note.
pub const OTHER_ADD: &str = "Other (add)";
pub const OTHER_SUBTRACT: &str = "Other (subtract)";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedCategory {
  pub name:          String,
  pub kind:          CategoryKind,
  #[serde(default = "default_weight")]
  pub weight:        f64,
  #[serde(default)]
  pub requires_note: bool,
}

fn default_weight() -> f64 { 1.0 }

impl SeedCategory {
  fn new(name: &str, kind: CategoryKind, requires_note: bool) -> Self {
    Self {
      name: name.to_owned(),
      kind,
      weight: default_weight(),
      requires_note,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeedData {
  pub students:   Vec<String>,
  pub categories: Vec<SeedCategory>,
}

impl SeedData {
  /// Built-in categories with a caller-supplied roster.
  pub fn with_roster(students: Vec<String>) -> Self {
    Self { students, ..Self::default() }
  }
}

impl Default for SeedData {
  fn default() -> Self {
    let add = ADD_CATEGORIES
      .iter()
      .map(|n| SeedCategory::new(n, CategoryKind::Add, false))
      .chain([SeedCategory::new(OTHER_ADD, CategoryKind::Add, true)]);
    let subtract = SUBTRACT_CATEGORIES
      .iter()
      .map(|n| SeedCategory::new(n, CategoryKind::Subtract, false))
      .chain([SeedCategory::new(OTHER_SUBTRACT, CategoryKind::Subtract, true)]);

    Self {
      students:   DEFAULT_STUDENTS.iter().map(|s| s.to_string()).collect(),
      categories: add.chain(subtract).collect(),
    }
  }
}
