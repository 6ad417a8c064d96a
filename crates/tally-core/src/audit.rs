//! The operation log: an append-only audit trail of scoring and
//! administrative actions.
//!
//! Every score event creation or revocation produces exactly one entry whose
//! `score_change` equals the effect on the student's total. The constructors
//! below are the only way backends build those entries, which keeps the
//! correspondence in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
  StudentId,
  category::{CategoryKind, ScoreCategory},
  event::{NewScoreEvent, ScoreEvent},
};

/// Student reference used for entries that are not about one student.
pub const SYSTEM_STUDENT: StudentId = 0;

/// Prefix of the category name recorded for a revocation.
pub const REVOKE_PREFIX: &str = "revoke: ";

/// The `action_type` column of `operation_logs`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
  Login,
  Add,
  Subtract,
  Revoke,
  Task,
  System,
}

impl From<CategoryKind> for ActionKind {
  fn from(kind: CategoryKind) -> Self {
    match kind {
      CategoryKind::Add => Self::Add,
      CategoryKind::Subtract => Self::Subtract,
    }
  }
}

/// Who is calling and from where; copied into every audit entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOrigin {
  /// Authenticated username, when there is one.
  pub actor:      Option<String>,
  pub ip_address: String,
  pub user_agent: String,
}

impl RequestOrigin {
  pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
    Self {
      actor:      None,
      ip_address: ip_address.into(),
      user_agent: user_agent.into(),
    }
  }

  pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
    self.actor = Some(actor.into());
    self
  }
}

// ─── Entries ─────────────────────────────────────────────────────────────────

/// A persisted audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
  pub id:            i64,
  pub student_id:    StudentId,
  pub action:        ActionKind,
  pub score_change:  i64,
  pub operator:      String,
  /// Denormalised so the entry stays readable if categories change.
  pub category_name: String,
  pub note:          Option<String>,
  pub ip_address:    String,
  pub user_agent:    String,
  pub created_at:    DateTime<Utc>,
}

/// An audit entry before the store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
  pub student_id:    StudentId,
  pub action:        ActionKind,
  pub score_change:  i64,
  pub operator:      String,
  pub category_name: String,
  pub note:          Option<String>,
  pub ip_address:    String,
  pub user_agent:    String,
}

impl NewLogEntry {
  fn from_origin(
    student_id: StudentId,
    action: ActionKind,
    operator: String,
    origin: &RequestOrigin,
  ) -> Self {
    Self {
      student_id,
      action,
      score_change: 0,
      operator,
      category_name: String::new(),
      note: None,
      ip_address: origin.ip_address.clone(),
      user_agent: origin.user_agent.clone(),
    }
  }

  /// The entry written alongside a newly recorded event.
  pub fn recorded(
    event: &NewScoreEvent,
    category: &ScoreCategory,
    origin: &RequestOrigin,
  ) -> Self {
    Self {
      score_change: category.kind.signed(event.score),
      category_name: category.name.clone(),
      note: event.note.clone(),
      ..Self::from_origin(
        event.student_id,
        category.kind.into(),
        event.operator.clone(),
        origin,
      )
    }
  }

  /// The compensating entry written when `event` is revoked. Its delta
  /// restores the total that existed before the event.
  pub fn revoked(
    event: &ScoreEvent,
    category_name: &str,
    kind: CategoryKind,
    origin: &RequestOrigin,
  ) -> Self {
    let operator = origin
      .actor
      .clone()
      .unwrap_or_else(|| event.operator.clone());
    Self {
      score_change: -kind.signed(event.score),
      category_name: format!("{REVOKE_PREFIX}{category_name}"),
      note: event.note.clone(),
      ..Self::from_origin(event.student_id, ActionKind::Revoke, operator, origin)
    }
  }

  pub fn login(username: &str, origin: &RequestOrigin) -> Self {
    Self::from_origin(
      SYSTEM_STUDENT,
      ActionKind::Login,
      username.to_owned(),
      origin,
    )
  }

  /// An administrative entry with no score effect.
  pub fn system(
    student_id: StudentId,
    summary: impl Into<String>,
    origin: &RequestOrigin,
  ) -> Self {
    let operator = origin.actor.clone().unwrap_or_default();
    Self {
      note: Some(summary.into()),
      ..Self::from_origin(student_id, ActionKind::System, operator, origin)
    }
  }
}

/// Parameters for [`crate::store::AuditLog::list_logs`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
  pub student_id: Option<StudentId>,
  pub action:     Option<ActionKind>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

impl LogQuery {
  pub const DEFAULT_LIMIT: usize = 100;
}
