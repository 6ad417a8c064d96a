//! Handlers for the IP-bound session.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/session` | The caller's live session, or `null` |
//! | `POST` | `/session/login` | Body: `{"username":"..","password":".."}`; 401 on bad credentials |
//! | `POST` | `/session/logout` | Ends the session bound to the caller's address |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tally_core::{
  session::{AccessGate, IpSession},
  store::TallyStore,
};

use crate::{AppState, Caller, error::ApiError};

/// `GET /session`
pub async fn current<S>(caller: Caller) -> Json<Option<IpSession>>
where
  S: TallyStore + 'static,
{
  Json(caller.session)
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  /// May be omitted for the admin role.
  #[serde(default)]
  pub username: String,
  pub password: String,
}

/// `POST /session/login`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Json(body): Json<LoginBody>,
) -> Result<Json<IpSession>, ApiError>
where
  S: TallyStore + 'static,
{
  let credentials = state.store.load_settings().await?.credentials;
  let gate = AccessGate::new(state.store.as_ref(), credentials);

  let session = gate
    .login(&body.username, &body.password, &caller.origin, Utc::now())
    .await?;
  match session {
    Some(session) => {
      tracing::info!(
        ip = %session.ip,
        username = %session.username,
        role = %session.role,
        "login"
      );
      Ok(Json(session))
    }
    None => {
      tracing::warn!(ip = %caller.origin.ip_address, "rejected login");
      Err(ApiError::Unauthorized)
    }
  }
}

/// `POST /session/logout`
pub async fn logout<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<StatusCode, ApiError>
where
  S: TallyStore + 'static,
{
  state.store.delete_session(&caller.origin.ip_address).await?;
  Ok(StatusCode::NO_CONTENT)
}
