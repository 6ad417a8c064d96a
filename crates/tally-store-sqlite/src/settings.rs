//! [`SettingsStore`] for [`SqliteStore`].

use chrono::Utc;
use tally_core::{
  Error as CoreError, Result as CoreResult,
  audit::{NewLogEntry, RequestOrigin, SYSTEM_STUDENT},
  settings::{SettingsPatch, SiteSettings},
  store::{SchemaStatus, SettingsStore},
};

use crate::{
  Result, SqliteStore,
  encode::encode_dt,
  store::{insert_log, settings_row_count},
};

fn read_pairs(conn: &rusqlite::Connection) -> Result<Vec<(String, String)>> {
  let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
  let pairs = stmt
    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(pairs)
}

fn write_pairs(
  conn: &rusqlite::Connection,
  pairs: &[(String, String)],
) -> Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO settings (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
  )?;
  for (key, value) in pairs {
    stmt.execute(rusqlite::params![key, value])?;
  }
  Ok(())
}

fn not_set_up() -> CoreError { CoreError::validation("site has not been set up") }

impl SettingsStore for SqliteStore {
  async fn schema_status(&self) -> CoreResult<SchemaStatus> {
    let configured = self
      .with_conn(|conn| Ok(settings_row_count(conn)? > 0))
      .await?;
    Ok(SchemaStatus { configured })
  }

  async fn load_settings(&self) -> CoreResult<SiteSettings> {
    let pairs = self.with_conn(|conn| read_pairs(conn)).await?;
    if pairs.is_empty() {
      return Err(not_set_up());
    }
    SiteSettings::from_pairs(pairs)
  }

  async fn complete_setup(&self, settings: SiteSettings) -> CoreResult<()> {
    settings.validate()?;
    let pairs = settings.to_pairs();

    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        if settings_row_count(&tx)? > 0 {
          return Err(CoreError::validation("site is already set up").into());
        }
        write_pairs(&tx, &pairs)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!("initial setup completed");
    Ok(())
  }

  async fn update_settings(
    &self,
    patch: SettingsPatch,
    origin: RequestOrigin,
  ) -> CoreResult<SiteSettings> {
    patch.validate()?;
    let pairs = patch.to_pairs();
    let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
    let summary = format!("updated settings: {}", keys.join(", "));
    let changed = pairs.len();

    let stored = self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        if settings_row_count(&tx)? == 0 {
          return Err(not_set_up().into());
        }
        if !pairs.is_empty() {
          write_pairs(&tx, &pairs)?;
          let entry = NewLogEntry::system(SYSTEM_STUDENT, summary, &origin);
          insert_log(&tx, &entry, &encode_dt(Utc::now()))?;
        }
        let stored = read_pairs(&tx)?;
        tx.commit()?;
        Ok(stored)
      })
      .await?;

    tracing::info!(keys = changed, "settings updated");
    SiteSettings::from_pairs(stored)
  }
}
