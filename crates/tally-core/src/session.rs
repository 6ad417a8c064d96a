//! Session/access gate: IP-pinned role grants.
//!
//! This is a low-assurance mechanism. Each role has one shared secret and the
//! session key is the caller's IP address; there is no token. The
//! [`SessionStore`] trait isolates the mechanism so it can be replaced without
//! touching the ledger.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
  Result,
  audit::{NewLogEntry, RequestOrigin},
  secret::verify_secret,
  settings::Credentials,
  store::AuditLog,
};

/// How long a successful login stays valid.
pub fn session_ttl() -> Duration { Duration::days(30) }

/// Username bound to admin sessions opened without one.
pub const ADMIN_USERNAME: &str = "admin";

// ─── Roles ───────────────────────────────────────────────────────────────────

/// An authenticated role. An anonymous visitor has no role.
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
pub enum Role {
  Class,
  Admin,
}

/// Operations the gate distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
  ViewStandings,
  ViewSnapshots,
  RecordScores,
  RevokeScores,
  ViewHistory,
  ViewLogs,
  CaptureSnapshots,
  ManageRoster,
  ManageSettings,
  ResetLedger,
}

impl Permission {
  pub fn granted_to(self, role: Option<Role>) -> bool {
    use Permission::*;
    match (self, role) {
      (ViewStandings | ViewSnapshots, _) => true,
      (_, Some(Role::Admin)) => true,
      (RecordScores | RevokeScores | ViewHistory | ViewLogs, Some(Role::Class)) => {
        true
      }
      _ => false,
    }
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpSession {
  pub ip:       String,
  pub username: String,
  pub role:     Role,
  pub expires:  DateTime<Utc>,
}

impl IpSession {
  /// A session is live strictly before its expiry instant.
  pub fn is_live(&self, now: DateTime<Utc>) -> bool { self.expires > now }
}

/// Persistence for IP sessions.
///
/// Expired rows are not removed by reads; they persist until overwritten by
/// a later login or deleted by logout.
pub trait SessionStore: Send + Sync {
  fn load_session<'a>(
    &'a self,
    ip: &'a str,
  ) -> impl Future<Output = Result<Option<IpSession>>> + Send + 'a;

  /// Insert or replace the session keyed by `session.ip`.
  fn upsert_session(
    &self,
    session: IpSession,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Remove the session for `ip`; a no-op if there is none.
  fn delete_session<'a>(
    &'a self,
    ip: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}

/// The live session for `ip` at `now`, if any.
pub async fn resolve_session<S: SessionStore>(
  store: &S,
  ip: &str,
  now: DateTime<Utc>,
) -> Result<Option<IpSession>> {
  Ok(store.load_session(ip).await?.filter(|s| s.is_live(now)))
}

// ─── Gate ────────────────────────────────────────────────────────────────────

/// Checks credentials and opens sessions. Built per request from the current
/// settings; the credentials are owned so they are read once.
pub struct AccessGate<'s, S> {
  store:       &'s S,
  credentials: Credentials,
}

impl<'s, S> AccessGate<'s, S>
where
  S: SessionStore + AuditLog,
{
  pub fn new(store: &'s S, credentials: Credentials) -> Self {
    Self { store, credentials }
  }

  /// The role the credentials grant, without side effects. The class role
  /// needs the username and password; the admin role needs only the
  /// password.
  pub fn authenticate(&self, username: &str, password: &str) -> Option<Role> {
    let creds = &self.credentials;
    if username.trim() == creds.class_username
      && verify_secret(password, &creds.class_password)
    {
      Some(Role::Class)
    } else if verify_secret(password, &creds.admin_password) {
      Some(Role::Admin)
    } else {
      None
    }
  }

  /// Authenticate and, on success, bind a session to the caller's IP and
  /// record a `login` audit entry. Returns `None` for bad credentials.
  pub async fn login(
    &self,
    username: &str,
    password: &str,
    origin: &RequestOrigin,
    now: DateTime<Utc>,
  ) -> Result<Option<IpSession>> {
    let Some(role) = self.authenticate(username, password) else {
      return Ok(None);
    };

    let username = match (role, username.trim()) {
      (Role::Admin, "") => ADMIN_USERNAME.to_owned(),
      (_, name) => name.to_owned(),
    };
    let session = IpSession {
      ip: origin.ip_address.clone(),
      username,
      role,
      expires: now + session_ttl(),
    };

    self.store.upsert_session(session.clone()).await?;
    self
      .store
      .append_log(NewLogEntry::login(&session.username, origin))
      .await?;
    Ok(Some(session))
  }

  pub async fn logout(&self, ip: &str) -> Result<()> {
    self.store.delete_session(ip).await
  }

  pub async fn resolve(
    &self,
    ip: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<IpSession>> {
    resolve_session(self.store, ip, now).await
  }
}
