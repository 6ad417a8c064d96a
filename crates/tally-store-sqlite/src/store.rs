//! [`SqliteStore`], the SQLite implementation of the ledger traits.
//!
//! Ledger writes run in one transaction together with their audit entries,
//! so a failed call leaves neither an orphan event nor an orphan log row.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tally_core::{
  EventId, Result as CoreResult, StudentId,
  audit::{ActionKind, NewLogEntry, RequestOrigin},
  category::ScoreCategory,
  event::{EventQuery, NewScoreBatch, NewScoreEvent, ScoreEvent, ScoreEventView},
  seed::SeedData,
  store::{LedgerStore, SchemaStatus},
  student::{Student, StudentTotals, normalize_student_name, rank_standings},
};

use crate::{
  Result,
  encode::{
    CATEGORY_COLUMNS, EVENT_VIEW_COLUMNS, RawCategory, RawEventView, RawTotals,
    STUDENT_COLUMNS, encode_action, encode_dt, encode_kind, student_from_row,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally store backed by a single SQLite file.
///
/// Clones share the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`. Call [`Self::ensure_schema`] before
  /// use.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Ok(Self { conn })
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Ok(Self { conn })
  }

  /// Create missing tables, migrate older layouts and, until setup has been
  /// completed, insert any seed rows that are not present yet. Safe to run
  /// on every start.
  pub async fn ensure_schema(&self, seed: &SeedData) -> Result<SchemaStatus> {
    let seed = seed.clone();
    let status = self
      .with_conn(move |conn| {
        conn.execute_batch(SCHEMA)?;
        migrate_requires_note(conn, &seed)?;

        let configured = settings_row_count(conn)? > 0;
        if !configured {
          let tx = conn.transaction()?;
          insert_seed(&tx, &seed)?;
          tx.commit()?;
        }
        Ok(SchemaStatus { configured })
      })
      .await?;

    tracing::debug!(configured = status.configured, "schema ensured");
    Ok(status)
  }

  /// Run `f` on the connection thread. Domain errors returned by `f` pass
  /// through untouched.
  pub(crate) async fn with_conn<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  async fn require_category(
    &self,
    id: tally_core::CategoryId,
  ) -> CoreResult<ScoreCategory> {
    self
      .get_category(id)
      .await?
      .ok_or(tally_core::Error::CategoryNotFound(id))
  }
}

// ─── Bootstrap helpers ───────────────────────────────────────────────────────

pub(crate) fn settings_row_count(conn: &rusqlite::Connection) -> Result<i64> {
  Ok(conn.query_row("SELECT COUNT(*) FROM settings", [], |r| r.get(0))?)
}

fn table_has_column(
  conn: &rusqlite::Connection,
  table: &str,
  column: &str,
) -> Result<bool> {
  let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
  let names = stmt
    .query_map([], |row| row.get::<_, String>(1))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(names.iter().any(|n| n == column))
}

/// Databases created before `requires_note` existed get the column, and the
/// free-form seed categories are flagged by name.
fn migrate_requires_note(
  conn: &rusqlite::Connection,
  seed: &SeedData,
) -> Result<()> {
  if table_has_column(conn, "score_categories", "requires_note")? {
    return Ok(());
  }

  conn.execute(
    "ALTER TABLE score_categories ADD COLUMN requires_note INTEGER NOT NULL DEFAULT 0",
    [],
  )?;
  let mut stmt =
    conn.prepare("UPDATE score_categories SET requires_note = 1 WHERE name = ?1")?;
  for category in seed.categories.iter().filter(|c| c.requires_note) {
    stmt.execute(rusqlite::params![category.name])?;
  }
  tracing::info!("migrated score_categories: added requires_note");
  Ok(())
}

fn insert_seed(conn: &rusqlite::Connection, seed: &SeedData) -> Result<()> {
  let mut students = conn.prepare("INSERT OR IGNORE INTO students (name) VALUES (?1)")?;
  for name in &seed.students {
    students.execute(rusqlite::params![name])?;
  }

  let mut categories = conn.prepare(
    "INSERT OR IGNORE INTO score_categories (name, type, weight, requires_note)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for c in &seed.categories {
    categories.execute(rusqlite::params![
      c.name,
      encode_kind(c.kind),
      c.weight,
      c.requires_note,
    ])?;
  }
  Ok(())
}

// ─── Statement helpers ───────────────────────────────────────────────────────

/// Insert an audit entry stamped with `at` and return its id.
pub(crate) fn insert_log(
  conn: &rusqlite::Connection,
  entry: &NewLogEntry,
  at: &str,
) -> Result<i64> {
  conn.execute(
    "INSERT INTO operation_logs (
       student_id, action_type, score_change, operator, category_name,
       note, ip_address, user_agent, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      entry.student_id,
      encode_action(entry.action),
      entry.score_change,
      entry.operator,
      entry.category_name,
      entry.note,
      entry.ip_address,
      entry.user_agent,
      at,
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

fn student_exists(conn: &rusqlite::Connection, id: StudentId) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM students WHERE id = ?1",
        rusqlite::params![id],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn insert_event(
  conn: &rusqlite::Connection,
  event: &NewScoreEvent,
  at: &str,
) -> Result<EventId> {
  conn.execute(
    "INSERT INTO score_records (student_id, category_id, score, operator, note, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      event.student_id,
      event.category_id,
      event.score,
      event.operator,
      event.note,
      at,
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

/// Write `events` and their audit entries. Every student is checked first so
/// a missing one aborts before any row is written.
fn write_events(
  conn: &mut rusqlite::Connection,
  events: &[NewScoreEvent],
  category: &ScoreCategory,
  origin: &RequestOrigin,
) -> Result<Vec<EventId>> {
  let tx = conn.transaction()?;
  for event in events {
    if !student_exists(&tx, event.student_id)? {
      return Err(tally_core::Error::StudentNotFound(event.student_id).into());
    }
  }

  let at = encode_dt(Utc::now());
  let mut ids = Vec::with_capacity(events.len());
  for event in events {
    ids.push(insert_event(&tx, event, &at)?);
    insert_log(&tx, &NewLogEntry::recorded(event, category, origin), &at)?;
  }
  tx.commit()?;
  Ok(ids)
}

/// Per-student sums of add and subtract events, in roster order.
pub(crate) fn query_totals(
  conn: &rusqlite::Connection,
) -> Result<Vec<StudentTotals>> {
  let mut stmt = conn.prepare(
    "SELECT
       s.id,
       s.name,
       COALESCE(SUM(CASE WHEN c.type = 'add'   THEN r.score END), 0) AS add_total,
       COALESCE(SUM(CASE WHEN c.type = 'minus' THEN r.score END), 0) AS minus_total
     FROM students s
     LEFT JOIN score_records    r ON r.student_id = s.id
     LEFT JOIN score_categories c ON c.id = r.category_id
     GROUP BY s.id, s.name
     ORDER BY s.id",
  )?;
  let rows = stmt
    .query_map([], RawTotals::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut totals: Vec<StudentTotals> =
    rows.into_iter().map(RawTotals::into_totals).collect();
  rank_standings(&mut totals);
  Ok(totals)
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  // ── Roster & categories ───────────────────────────────────────────────────

  async fn list_students(&self) -> CoreResult<Vec<Student>> {
    let students = self
      .with_conn(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY id"))?;
        let rows = stmt
          .query_map([], student_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(students)
  }

  async fn get_student(&self, id: StudentId) -> CoreResult<Option<Student>> {
    let student = self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
              rusqlite::params![id],
              student_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(student)
  }

  async fn add_student(
    &self,
    name: String,
    origin: RequestOrigin,
  ) -> CoreResult<Student> {
    let name = normalize_student_name(&name)?;

    let student = self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let taken = tx
          .query_row(
            "SELECT 1 FROM students WHERE name = ?1",
            rusqlite::params![name],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Err(
            tally_core::Error::validation(format!("student {name:?} already exists"))
              .into(),
          );
        }

        tx.execute("INSERT INTO students (name) VALUES (?1)", rusqlite::params![name])?;
        let student = Student { id: tx.last_insert_rowid(), name };
        let entry = NewLogEntry::system(
          student.id,
          format!("added student {}", student.name),
          &origin,
        );
        insert_log(&tx, &entry, &encode_dt(Utc::now()))?;
        tx.commit()?;
        Ok(student)
      })
      .await?;

    tracing::info!(student_id = student.id, name = %student.name, "student added");
    Ok(student)
  }

  async fn list_categories(&self) -> CoreResult<Vec<ScoreCategory>> {
    let raws = self
      .with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CATEGORY_COLUMNS} FROM score_categories ORDER BY id"
        ))?;
        let rows = stmt
          .query_map([], RawCategory::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(RawCategory::into_category)
        .collect::<Result<_>>()?,
    )
  }

  async fn get_category(
    &self,
    id: tally_core::CategoryId,
  ) -> CoreResult<Option<ScoreCategory>> {
    let raw = self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CATEGORY_COLUMNS} FROM score_categories WHERE id = ?1"),
              rusqlite::params![id],
              RawCategory::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawCategory::into_category).transpose()?)
  }

  // ── Events ────────────────────────────────────────────────────────────────

  async fn record_event(
    &self,
    input: NewScoreEvent,
    origin: RequestOrigin,
  ) -> CoreResult<EventId> {
    let category = self.require_category(input.category_id).await?;
    let event = input.validated(&category)?;
    let student_id = event.student_id;
    let delta = category.kind.signed(event.score);

    let ids = self
      .with_conn(move |conn| write_events(conn, &[event], &category, &origin))
      .await?;
    let id = ids[0];

    tracing::info!(event_id = id, student_id, delta, "score event recorded");
    Ok(id)
  }

  async fn record_batch(
    &self,
    input: NewScoreBatch,
    origin: RequestOrigin,
  ) -> CoreResult<usize> {
    let category = self.require_category(input.category_id).await?;
    let events = input.expand(&category)?;
    let category_id = category.id;

    let ids = self
      .with_conn(move |conn| write_events(conn, &events, &category, &origin))
      .await?;

    tracing::info!(category_id, students = ids.len(), "score batch recorded");
    Ok(ids.len())
  }

  async fn revoke_event(
    &self,
    id: EventId,
    origin: RequestOrigin,
  ) -> CoreResult<ScoreEvent> {
    let view = self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(
            &format!(
              "SELECT {EVENT_VIEW_COLUMNS}
               FROM score_records r
               JOIN score_categories c ON c.id = r.category_id
               WHERE r.id = ?1"
            ),
            rusqlite::params![id],
            RawEventView::from_row,
          )
          .optional()?
          .ok_or(tally_core::Error::EventNotFound(id))?;
        let view = raw.into_view()?;

        // First committer wins: a concurrent revoke sees zero rows here.
        let deleted =
          tx.execute("DELETE FROM score_records WHERE id = ?1", rusqlite::params![id])?;
        if deleted == 0 {
          return Err(tally_core::Error::EventNotFound(id).into());
        }

        let entry =
          NewLogEntry::revoked(&view.event, &view.category_name, view.kind, &origin);
        insert_log(&tx, &entry, &encode_dt(Utc::now()))?;
        tx.commit()?;
        Ok(view)
      })
      .await?;

    tracing::info!(
      event_id = id,
      student_id = view.event.student_id,
      delta = -view.signed_score(),
      "score event revoked"
    );
    Ok(view.event)
  }

  async fn list_events(&self, query: &EventQuery) -> CoreResult<Vec<ScoreEventView>> {
    let student_id = query.student_id;
    let limit = query
      .limit
      .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
      .unwrap_or(-1);

    let raws = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_VIEW_COLUMNS}
           FROM score_records r
           JOIN score_categories c ON c.id = r.category_id
           WHERE (?1 IS NULL OR r.student_id = ?1)
           ORDER BY r.id DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![student_id, limit], RawEventView::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(RawEventView::into_view)
        .collect::<Result<_>>()?,
    )
  }

  async fn student_aggregates(&self) -> CoreResult<Vec<StudentTotals>> {
    Ok(self.with_conn(|conn| query_totals(conn)).await?)
  }

  async fn reset_all(&self) -> CoreResult<()> {
    let (events, logs) = self
      .with_conn(|conn| {
        let tx = conn.transaction()?;
        let events = tx.execute("DELETE FROM score_records", [])?;
        let logs = tx.execute(
          "DELETE FROM operation_logs WHERE action_type != ?1",
          rusqlite::params![encode_action(ActionKind::Login)],
        )?;
        tx.commit()?;
        Ok((events, logs))
      })
      .await?;

    tracing::warn!(events, logs, "ledger reset");
    Ok(())
  }
}
