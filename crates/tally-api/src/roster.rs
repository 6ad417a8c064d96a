//! Handlers for the roster, categories and standings.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/standings` | Ranked totals; open to visitors |
//! | `GET`  | `/students` | Roster in id order |
//! | `POST` | `/students` | Admin. Body: `{"name":"Quinn"}`; returns 201 |
//! | `GET`  | `/categories` | Score categories in id order |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tally_core::{
  category::ScoreCategory,
  session::Permission,
  store::TallyStore,
  student::{Student, StudentTotals},
};

use crate::{AppState, Caller, error::ApiError};

// ─── Standings ───────────────────────────────────────────────────────────────

/// `GET /standings`
pub async fn standings<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<Json<Vec<StudentTotals>>, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::ViewStandings)?;
  Ok(Json(state.store.student_aggregates().await?))
}

// ─── Students ────────────────────────────────────────────────────────────────

/// `GET /students`
pub async fn list<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Student>>, ApiError>
where
  S: TallyStore + 'static,
{
  Ok(Json(state.store.list_students().await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /students`, body: `{"name":"Quinn"}`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::ManageRoster)?;
  let student = state.store.add_student(body.name, caller.origin).await?;
  Ok((StatusCode::CREATED, Json(student)))
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// `GET /categories`
pub async fn categories<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<ScoreCategory>>, ApiError>
where
  S: TallyStore + 'static,
{
  Ok(Json(state.store.list_categories().await?))
}
