//! Handler for the operation log.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/logs` | Class. Optional `student_id`, `action`, `limit` (default 100), `offset` |

use axum::{
  Json,
  extract::{Query, State},
};
use tally_core::{
  audit::{LogEntry, LogQuery},
  session::Permission,
  store::TallyStore,
};

use crate::{AppState, Caller, error::ApiError};

/// `GET /logs[?student_id=<id>][&action=<kind>][&limit=<n>][&offset=<n>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::ViewLogs)?;
  Ok(Json(state.store.list_logs(&query).await?))
}
