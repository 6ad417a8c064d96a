//! [`SnapshotStore`] for [`SqliteStore`].
//!
//! A capture reads the standings and writes every row of the batch inside one
//! transaction, so a batch is either complete or absent.

use chrono::{DateTime, SubsecRound as _, Utc};
use tally_core::{
  Result as CoreResult,
  audit::{NewLogEntry, RequestOrigin, SYSTEM_STUDENT},
  snapshot::{SnapshotBatch, SnapshotRow, month_tag, normalize_title},
  store::SnapshotStore,
};

use crate::{
  Result, SqliteStore,
  encode::{
    RawSnapshotBatch, RawSnapshotRow, SNAPSHOT_COLUMNS, decode_dt, encode_dt,
  },
  store::{insert_log, query_totals},
};

impl SnapshotStore for SqliteStore {
  async fn capture_snapshot(
    &self,
    title: String,
    origin: RequestOrigin,
  ) -> CoreResult<SnapshotBatch> {
    let title = normalize_title(&title)?;
    // Truncated to the stored precision so the returned key matches lookups.
    let taken_at = Utc::now().trunc_subsecs(6);
    let batch = SnapshotBatch {
      snapshot_time: taken_at,
      title,
      month: month_tag(taken_at),
    };

    let at = encode_dt(taken_at);
    let b = batch.clone();
    let students = self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let totals = query_totals(&tx)?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO monthly_snapshots (
               snapshot_time, title, month, student_name,
               add_score, minus_score, total_score, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for t in &totals {
            stmt.execute(rusqlite::params![
              at,
              b.title,
              b.month,
              t.name,
              t.add_total,
              t.subtract_total,
              t.net_total,
              at,
            ])?;
          }
        }
        let entry = NewLogEntry::system(
          SYSTEM_STUDENT,
          format!("captured snapshot {:?} ({})", b.title, b.month),
          &origin,
        );
        insert_log(&tx, &entry, &at)?;
        tx.commit()?;
        Ok(totals.len())
      })
      .await?;

    tracing::info!(
      title = %batch.title,
      month = %batch.month,
      students,
      "snapshot captured"
    );
    Ok(batch)
  }

  async fn list_snapshot_batches(&self) -> CoreResult<Vec<SnapshotBatch>> {
    let raws = self
      .with_conn(|conn| {
        let mut stmt = conn.prepare(
          "SELECT snapshot_time, MIN(title), MIN(month)
           FROM monthly_snapshots
           GROUP BY snapshot_time
           ORDER BY snapshot_time DESC",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawSnapshotBatch {
              snapshot_time: row.get(0)?,
              title:         row.get(1)?,
              month:         row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(RawSnapshotBatch::into_batch)
        .collect::<Result<_>>()?,
    )
  }

  async fn get_snapshot_batch(
    &self,
    snapshot_time: DateTime<Utc>,
  ) -> CoreResult<Vec<SnapshotRow>> {
    let raws = self
      .with_conn(move |conn| {
        // Imported batches may use an older key format; match on the instant.
        let keys = {
          let mut stmt =
            conn.prepare("SELECT DISTINCT snapshot_time FROM monthly_snapshots")?;
          stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter(|key| {
              decode_dt(key).is_ok_and(|decoded| decoded == snapshot_time)
            })
            .collect::<Vec<_>>()
        };

        let mut stmt = conn.prepare(&format!(
          "SELECT {SNAPSHOT_COLUMNS}
           FROM monthly_snapshots
           WHERE snapshot_time = ?1
           ORDER BY total_score DESC, id ASC"
        ))?;
        let mut rows = Vec::new();
        for key in &keys {
          rows.extend(
            stmt
              .query_map(rusqlite::params![key], RawSnapshotRow::from_row)?
              .collect::<rusqlite::Result<Vec<_>>>()?,
          );
        }
        if keys.len() > 1 {
          rows.sort_by(|a, b| {
            b.total_score.cmp(&a.total_score).then(a.id.cmp(&b.id))
          });
        }
        Ok(rows)
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(RawSnapshotRow::into_row)
        .collect::<Result<_>>()?,
    )
  }
}
