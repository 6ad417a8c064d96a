//! [`SessionStore`] for [`SqliteStore`].

use rusqlite::OptionalExtension as _;
use tally_core::{
  Result as CoreResult,
  session::{IpSession, SessionStore},
};

use crate::{
  SqliteStore,
  encode::{RawSession, encode_dt, encode_role},
};

impl SessionStore for SqliteStore {
  async fn load_session(&self, ip: &str) -> CoreResult<Option<IpSession>> {
    let ip = ip.to_owned();
    let raw = self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT ip, username, role, expires FROM ip_sessions WHERE ip = ?1",
              rusqlite::params![ip],
              |row| {
                Ok(RawSession {
                  ip:       row.get(0)?,
                  username: row.get(1)?,
                  role:     row.get(2)?,
                  expires:  row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawSession::into_session).transpose()?)
  }

  async fn upsert_session(&self, session: IpSession) -> CoreResult<()> {
    let role = encode_role(session.role);
    let expires = encode_dt(session.expires);
    let (ip, username) = (session.ip, session.username);

    self
      .with_conn(move |conn| {
        conn.execute(
          "INSERT INTO ip_sessions (ip, username, role, expires)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(ip) DO UPDATE SET
             username = excluded.username,
             role     = excluded.role,
             expires  = excluded.expires",
          rusqlite::params![ip, username, role, expires],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(role, "session opened");
    Ok(())
  }

  async fn delete_session(&self, ip: &str) -> CoreResult<()> {
    let ip = ip.to_owned();
    self
      .with_conn(move |conn| {
        conn.execute("DELETE FROM ip_sessions WHERE ip = ?1", rusqlite::params![ip])?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
