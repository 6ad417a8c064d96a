//! Handlers for site settings and first-run setup.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/settings` | Admin. Secrets are never returned |
//! | `PUT`  | `/settings` | Admin. Body: partial settings; returns the result |
//! | `GET`  | `/setup` | `{"configured":bool}` |
//! | `POST` | `/setup` | Only while unconfigured. Body: full settings; returns 201 |
//!
//! Secrets arriving through these handlers are stored as argon2 hashes.

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use tally_core::{
  session::Permission,
  settings::{PublicSettings, SettingsPatch, SiteSettings},
  store::{SchemaStatus, TallyStore},
};

use crate::{AppState, Caller, error::ApiError};

/// `GET /settings`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<Json<PublicSettings>, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::ManageSettings)?;
  Ok(Json(state.store.load_settings().await?.public_view()))
}

/// `PUT /settings`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Json(patch): Json<SettingsPatch>,
) -> Result<Json<PublicSettings>, ApiError>
where
  S: TallyStore + 'static,
{
  caller.require(Permission::ManageSettings)?;
  patch.validate()?;
  let patch = patch.sealed()?;
  let settings = state.store.update_settings(patch, caller.origin).await?;
  Ok(Json(settings.public_view()))
}

/// `GET /setup`
pub async fn status<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<SchemaStatus>, ApiError>
where
  S: TallyStore + 'static,
{
  Ok(Json(state.store.schema_status().await?))
}

/// `POST /setup`
pub async fn setup<S>(
  State(state): State<AppState<S>>,
  Json(settings): Json<SiteSettings>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TallyStore + 'static,
{
  if state.store.schema_status().await?.configured {
    return Err(ApiError::BadRequest("site is already set up".into()));
  }
  settings.validate()?;
  let settings = SiteSettings {
    credentials: settings.credentials.sealed()?,
    ..settings
  };

  state.store.complete_setup(settings.clone()).await?;
  tracing::info!(class_name = %settings.class_name, "site set up");
  Ok((StatusCode::CREATED, Json(settings.public_view())))
}
