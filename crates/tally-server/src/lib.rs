//! HTTP server assembly for Tally.
//!
//! The binary in `main.rs` loads a [`ServerConfig`], opens the store and
//! serves [`app`]. Keeping assembly here lets tests drive the full router.

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use serde::Deserialize;
use tally_api::{ApiConfig, api_router};
use tally_core::{seed::SeedData, store::TallyStore};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STORE_PATH: &str = "~/.local/share/tally/tally.db";

/// Runtime server configuration, deserialised from `config.toml` layered
/// under `TALLY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// Header consulted for the client address before the socket peer.
  #[serde(default)]
  pub client_ip_header: Option<String>,
  /// Replaces the built-in seed roster on first run.
  #[serde(default)]
  pub roster:           Option<Vec<String>>,
}

impl ServerConfig {
  pub fn seed_data(&self) -> SeedData {
    match &self.roster {
      Some(names) if !names.is_empty() => SeedData::with_roster(names.clone()),
      _ => SeedData::default(),
    }
  }

  pub fn api_config(&self) -> ApiConfig {
    ApiConfig {
      client_ip_header: self.client_ip_header.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The complete application: the JSON API under `/api`, wrapped in request
/// tracing.
pub fn app<S>(store: Arc<S>, config: &ServerConfig) -> Router
where
  S: TallyStore + 'static,
{
  Router::new()
    .nest("/api", api_router(store, config.api_config()))
    .layer(TraceLayer::new_for_http())
}
