//! Handlers for score events.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/events` | Class. Optional `?student_id` and `?limit` |
//! | `POST`   | `/events` | Class. Body: [`RecordBody`]; returns 201 + `{"id":..}` |
//! | `POST`   | `/events/batch` | Class. Body: [`BatchBody`]; returns 201 + `{"recorded":n}` |
//! | `DELETE` | `/events/:id` | Class. Returns the revoked event |
//! | `POST`   | `/reset` | Admin. Body: `{"confirm":true}` |
//!
//! The operator defaults to the session's username when the body omits it.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tally_core::{
  CategoryId, EventId, StudentId,
  event::{EventQuery, NewScoreBatch, NewScoreEvent, ScoreEvent, ScoreEventView},
  session::Permission,
  store::TallyStore,
};

use crate::{AppState, Caller, error::ApiError};

/// The body's operator if given, else the caller's username.
fn operator_for(caller: &Caller, given: Option<String>) -> String {
  given
    .filter(|o| !o.trim().is_empty())
    .or_else(|| caller.username().map(str::to_owned))
    .unwrap_or_default()
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub student_id: Option<StudentId>,
  pub limit:      Option<usize>,
}

/// `GET /events[?student_id=<id>][&limit=<n>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ScoreEventView>>, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::ViewHistory)?;
  let query = EventQuery {
    student_id: params.student_id,
    limit:      params.limit,
  };
  Ok(Json(state.store.list_events(&query).await?))
}

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecordBody {
  pub student_id:  StudentId,
  pub category_id: CategoryId,
  pub score:       i64,
  pub operator:    Option<String>,
  pub note:        Option<String>,
}

/// `POST /events`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Json(body): Json<RecordBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::RecordScores)?;
  let event = NewScoreEvent {
    student_id:  body.student_id,
    category_id: body.category_id,
    score:       body.score,
    operator:    operator_for(&caller, body.operator),
    note:        body.note,
  };
  let id = state.store.record_event(event, caller.origin).await?;
  Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
  pub student_ids: Vec<StudentId>,
  pub category_id: CategoryId,
  pub score:       i64,
  pub operator:    Option<String>,
  pub note:        Option<String>,
}

/// `POST /events/batch`
pub async fn create_batch<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Json(body): Json<BatchBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::RecordScores)?;
  let batch = NewScoreBatch {
    student_ids: body.student_ids,
    category_id: body.category_id,
    score:       body.score,
    operator:    operator_for(&caller, body.operator),
    note:        body.note,
  };
  let recorded = state.store.record_batch(batch, caller.origin).await?;
  Ok((StatusCode::CREATED, Json(json!({ "recorded": recorded }))))
}

// ─── Revoke ──────────────────────────────────────────────────────────────────

/// `DELETE /events/:id`
pub async fn revoke<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<EventId>,
) -> Result<Json<ScoreEvent>, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::RevokeScores)?;
  Ok(Json(state.store.revoke_event(id, caller.origin).await?))
}

// ─── Reset ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResetBody {
  #[serde(default)]
  pub confirm: bool,
}

/// `POST /reset`, body: `{"confirm":true}`
pub async fn reset<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Json(body): Json<ResetBody>,
) -> Result<StatusCode, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::ResetLedger)?;
  if !body.confirm {
    return Err(ApiError::BadRequest(
      "reset must be confirmed with {\"confirm\": true}".into(),
    ));
  }
  state.store.reset_all().await?;
  tracing::warn!(ip = %caller.origin.ip_address, "ledger reset via API");
  Ok(StatusCode::NO_CONTENT)
}
