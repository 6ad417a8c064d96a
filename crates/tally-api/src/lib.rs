//! JSON REST API for Tally.
//!
//! Exposes an axum [`Router`] backed by any [`TallyStore`]. Handlers stay
//! thin: they resolve the caller, check the role against the permission
//! table and hand the request to the store. TLS and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tally_api::api_router(store.clone(), ApiConfig::default()))
//! ```

pub mod caller;
pub mod error;
pub mod events;
pub mod logs;
pub mod roster;
pub mod session;
pub mod settings;
pub mod snapshots;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use serde::Deserialize;
use tally_core::store::TallyStore;

pub use caller::Caller;
pub use error::ApiError;

/// Request-handling options supplied by the server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
  /// Header carrying the client address when running behind a proxy, e.g.
  /// `x-forwarded-for`. Only the first listed address is used.
  #[serde(default)]
  pub client_ip_header: Option<String>,
}

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub config: Arc<ApiConfig>,
}

// Manual impl: cloning the `Arc`s must not require `S: Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      config: Arc::clone(&self.config),
    }
  }
}

/// Build the API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, config: ApiConfig) -> Router<()>
where
  S: TallyStore + 'static,
{
  let state = AppState {
    store,
    config: Arc::new(config),
  };

  Router::new()
    // Roster
    .route("/standings", get(roster::standings::<S>))
    .route("/students", get(roster::list::<S>).post(roster::create::<S>))
    .route("/categories", get(roster::categories::<S>))
    // Events
    .route("/events", get(events::list::<S>).post(events::create::<S>))
    .route("/events/batch", post(events::create_batch::<S>))
    .route("/events/{id}", delete(events::revoke::<S>))
    .route("/reset", post(events::reset::<S>))
    // Snapshots
    .route(
      "/snapshots",
      get(snapshots::list::<S>).post(snapshots::capture::<S>),
    )
    .route("/snapshots/{timestamp}", get(snapshots::get_one::<S>))
    // Audit log
    .route("/logs", get(logs::list::<S>))
    // Session
    .route("/session", get(session::current::<S>))
    .route("/session/login", post(session::login::<S>))
    .route("/session/logout", post(session::logout::<S>))
    // Settings
    .route(
      "/settings",
      get(settings::get_one::<S>).put(settings::update::<S>),
    )
    .route("/setup", get(settings::status::<S>).post(settings::setup::<S>))
    .with_state(state)
}
