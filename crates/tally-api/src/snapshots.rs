//! Handlers for standings snapshots.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/snapshots` | Batches, most recent first |
//! | `POST` | `/snapshots` | Admin. Body: `{"title":"week 1"}`; returns 201 + batch |
//! | `GET`  | `/snapshots/:timestamp` | RFC 3339 batch key; 404 if no rows |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tally_core::{
  session::Permission,
  snapshot::{SnapshotBatch, SnapshotRow},
  store::TallyStore,
};

use crate::{AppState, Caller, error::ApiError};

/// `GET /snapshots`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<Json<Vec<SnapshotBatch>>, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::ViewSnapshots)?;
  Ok(Json(state.store.list_snapshot_batches().await?))
}

#[derive(Debug, Deserialize)]
pub struct CaptureBody {
  pub title: String,
}

/// `POST /snapshots`
pub async fn capture<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Json(body): Json<CaptureBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::CaptureSnapshots)?;
  let batch = state.store.capture_snapshot(body.title, caller.origin).await?;
  Ok((StatusCode::CREATED, Json(batch)))
}

/// `GET /snapshots/:timestamp`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(timestamp): Path<String>,
) -> Result<Json<Vec<SnapshotRow>>, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::ViewSnapshots)?;
  let at = DateTime::parse_from_rfc3339(&timestamp)
    .map_err(|e| ApiError::BadRequest(format!("invalid timestamp {timestamp:?}: {e}")))?
    .with_timezone(&Utc);

  let rows = state.store.get_snapshot_batch(at).await?;
  if rows.is_empty() {
    return Err(ApiError::NotFound(format!("no snapshot taken at {timestamp}")));
  }
  Ok(Json(rows))
}
