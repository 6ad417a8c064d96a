//! The [`Caller`] extractor: who is making a request, from where, and with
//! which role.

use std::net::SocketAddr;

use axum::{
  extract::{ConnectInfo, FromRequestParts},
  http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use tally_core::{
  audit::RequestOrigin,
  session::{IpSession, Permission, Role, resolve_session},
  store::TallyStore,
};

use crate::{ApiConfig, AppState, error::ApiError};

/// Address used when neither the configured header nor the socket address is
/// available.
const UNKNOWN_IP: &str = "unknown";

/// The resolved caller. Anonymous visitors have no session.
#[derive(Debug, Clone)]
pub struct Caller {
  pub origin:  RequestOrigin,
  pub session: Option<IpSession>,
}

impl Caller {
  pub fn role(&self) -> Option<Role> { self.session.as_ref().map(|s| s.role) }

  pub fn username(&self) -> Option<&str> {
    self.session.as_ref().map(|s| s.username.as_str())
  }

  /// `Unauthorized` for an anonymous caller, `Forbidden` for a role that
  /// does not grant `permission`.
  pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
    if permission.granted_to(self.role()) {
      return Ok(());
    }
    match self.role() {
      None => Err(ApiError::Unauthorized),
      Some(role) => Err(ApiError::Forbidden(format!(
        "the {role} role may not perform this operation"
      ))),
    }
  }
}

/// The client address: first entry of the configured header, else the socket
/// peer.
fn client_ip(parts: &Parts, config: &ApiConfig) -> String {
  let from_header = config.client_ip_header.as_deref().and_then(|name| {
    parts
      .headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.split(',').next())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(str::to_owned)
  });

  from_header
    .or_else(|| {
      parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
    .unwrap_or_else(|| UNKNOWN_IP.to_owned())
}

fn user_agent(headers: &HeaderMap) -> String {
  headers
    .get(header::USER_AGENT)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
    .to_owned()
}

impl<S> FromRequestParts<AppState<S>> for Caller
where
  S: TallyStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let ip = client_ip(parts, &state.config);
    let session = resolve_session(state.store.as_ref(), &ip, Utc::now()).await?;

    let mut origin = RequestOrigin::new(ip, user_agent(&parts.headers));
    if let Some(s) = &session {
      origin = origin.with_actor(s.username.clone());
    }
    Ok(Self { origin, session })
  }
}
