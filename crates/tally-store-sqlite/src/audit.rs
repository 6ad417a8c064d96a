//! [`AuditLog`] for [`SqliteStore`].

use chrono::Utc;
use tally_core::{
  Result as CoreResult,
  audit::{LogEntry, LogQuery, NewLogEntry},
  store::AuditLog,
};

use crate::{
  SqliteStore,
  encode::{LOG_COLUMNS, RawLogEntry, encode_action, encode_dt},
  store::insert_log,
};

impl AuditLog for SqliteStore {
  async fn append_log(&self, entry: NewLogEntry) -> CoreResult<LogEntry> {
    let created_at = Utc::now();
    let at = encode_dt(created_at);

    let (id, entry) = self
      .with_conn(move |conn| {
        let id = insert_log(conn, &entry, &at)?;
        Ok((id, entry))
      })
      .await?;

    Ok(LogEntry {
      id,
      student_id: entry.student_id,
      action: entry.action,
      score_change: entry.score_change,
      operator: entry.operator,
      category_name: entry.category_name,
      note: entry.note,
      ip_address: entry.ip_address,
      user_agent: entry.user_agent,
      created_at,
    })
  }

  async fn list_logs(&self, query: &LogQuery) -> CoreResult<Vec<LogEntry>> {
    let student_id = query.student_id;
    let action = query.action.map(encode_action);
    let limit = i64::try_from(query.limit.unwrap_or(LogQuery::DEFAULT_LIMIT))
      .unwrap_or(i64::MAX);
    let offset = i64::try_from(query.offset.unwrap_or(0)).unwrap_or(i64::MAX);

    let raws = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {LOG_COLUMNS}
           FROM operation_logs
           WHERE (?1 IS NULL OR student_id = ?1)
             AND (?2 IS NULL OR action_type = ?2)
           ORDER BY id DESC
           LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![student_id, action, limit, offset],
            RawLogEntry::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    tracing::debug!(count = raws.len(), "audit log listed");
    Ok(
      raws
        .into_iter()
        .map(RawLogEntry::into_entry)
        .collect::<crate::Result<_>>()?,
    )
  }
}
