//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use tally_core::{
  CategoryId, Error as CoreError,
  audit::{ActionKind, LogQuery, NewLogEntry, RequestOrigin},
  event::{EventQuery, NewScoreBatch, NewScoreEvent},
  seed::{OTHER_ADD, OTHER_SUBTRACT, SeedData},
  session::{AccessGate, IpSession, Role, SessionStore, resolve_session},
  settings::{Credentials, SettingsPatch, SiteSettings},
  store::{AuditLog, LedgerStore, SettingsStore, SnapshotStore},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  let s = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  s.ensure_schema(&SeedData::default())
    .await
    .expect("schema");
  s
}

fn origin() -> RequestOrigin { RequestOrigin::new("10.0.0.1", "test-agent") }

async fn category(s: &SqliteStore, name: &str) -> CategoryId {
  s.list_categories()
    .await
    .unwrap()
    .into_iter()
    .find(|c| c.name == name)
    .unwrap_or_else(|| panic!("seed category {name:?}"))
    .id
}

async fn net_total(s: &SqliteStore, student_id: i64) -> i64 {
  s.student_aggregates()
    .await
    .unwrap()
    .into_iter()
    .find(|t| t.student_id == student_id)
    .expect("student in standings")
    .net_total
}

async fn logs(s: &SqliteStore, query: LogQuery) -> Vec<tally_core::audit::LogEntry> {
  s.list_logs(&query).await.unwrap()
}

fn settings() -> SiteSettings {
  SiteSettings {
    site_title:    "Room 12".into(),
    class_name:    "7A".into(),
    current_month: "2026-10".into(),
    credentials:   Credentials {
      class_username: "class".into(),
      class_password: "chalk".into(),
      admin_password: "board".into(),
    },
  }
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_is_idempotent() {
  let s = store().await;
  let status = s.ensure_schema(&SeedData::default()).await.unwrap();
  assert!(!status.configured);

  assert_eq!(s.list_students().await.unwrap().len(), 16);
  assert_eq!(s.list_categories().await.unwrap().len(), 22);
}

#[tokio::test]
async fn seeding_stops_once_configured() {
  let s = store().await;
  s.complete_setup(settings()).await.unwrap();

  let status = s
    .ensure_schema(&SeedData::with_roster(vec!["Zed".into()]))
    .await
    .unwrap();
  assert!(status.configured);
  assert!(
    s.list_students()
      .await
      .unwrap()
      .iter()
      .all(|st| st.name != "Zed")
  );
}

#[tokio::test]
async fn custom_roster_is_seeded() {
  let s = SqliteStore::open_in_memory().await.unwrap();
  s.ensure_schema(&SeedData::with_roster(vec!["Ana".into(), "Bo".into()]))
    .await
    .unwrap();

  let names: Vec<_> = s
    .list_students()
    .await
    .unwrap()
    .into_iter()
    .map(|st| st.name)
    .collect();
  assert_eq!(names, vec!["Ana", "Bo"]);
}

#[tokio::test]
async fn requires_note_is_migrated_onto_older_databases() {
  let s = SqliteStore::open_in_memory().await.unwrap();
  s.with_conn(|conn| {
    conn.execute_batch(
      "CREATE TABLE score_categories (
         id     INTEGER PRIMARY KEY AUTOINCREMENT,
         name   TEXT NOT NULL UNIQUE,
         type   TEXT NOT NULL,
         weight REAL NOT NULL DEFAULT 1
       );
       INSERT INTO score_categories (name, type) VALUES
         ('Attendance', 'add'),
         ('Other (add)', 'add');",
    )?;
    Ok(())
  })
  .await
  .unwrap();

  s.ensure_schema(&SeedData::default()).await.unwrap();

  let categories = s.list_categories().await.unwrap();
  let other = categories.iter().find(|c| c.name == OTHER_ADD).unwrap();
  let attendance = categories.iter().find(|c| c.name == "Attendance").unwrap();
  assert!(other.requires_note);
  assert!(!attendance.requires_note);
  // Rows that were already present keep their ids.
  assert_eq!(attendance.id, 1);
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_revoke_and_snapshot_end_to_end() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;

  let first = s
    .record_event(NewScoreEvent::new(1, attendance, 5, "Ms. Reyes"), origin())
    .await
    .unwrap();
  assert_eq!(net_total(&s, 1).await, 5);

  s.record_event(NewScoreEvent::new(1, attendance, 3, "Mr. Okafor"), origin())
    .await
    .unwrap();
  assert_eq!(net_total(&s, 1).await, 8);

  s.revoke_event(first, origin()).await.unwrap();
  assert_eq!(net_total(&s, 1).await, 3);

  let batch = s.capture_snapshot("week1".into(), origin()).await.unwrap();
  let rows = s.get_snapshot_batch(batch.snapshot_time).await.unwrap();
  assert_eq!(rows.len(), 16);
  let alice = rows.iter().find(|r| r.student_name == "Alice").unwrap();
  assert_eq!((alice.add_score, alice.minus_score, alice.total_score), (3, 0, 3));
  assert_eq!(alice.title, "week1");
  assert_eq!(rows[0].student_name, "Alice");
}

#[tokio::test]
async fn audit_deltas_sum_to_net_total() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;
  let late = category(&s, "Late arrival").await;

  let a = s
    .record_event(NewScoreEvent::new(2, attendance, 4, "t"), origin())
    .await
    .unwrap();
  s.record_event(NewScoreEvent::new(2, late, 2, "t"), origin())
    .await
    .unwrap();
  let c = s
    .record_event(NewScoreEvent::new(2, late, 1, "t"), origin())
    .await
    .unwrap();
  s.revoke_event(c, origin()).await.unwrap();
  s.revoke_event(a, origin()).await.unwrap();

  let entries = logs(&s, LogQuery {
    student_id: Some(2),
    ..Default::default()
  })
  .await;
  assert_eq!(entries.len(), 5);
  let sum: i64 = entries.iter().map(|e| e.score_change).sum();
  assert_eq!(sum, net_total(&s, 2).await);
  assert_eq!(sum, -2);

  let revokes: Vec<_> = entries
    .iter()
    .filter(|e| e.action == ActionKind::Revoke)
    .collect();
  assert_eq!(revokes.len(), 2);
  assert!(revokes.iter().all(|e| e.category_name.starts_with("revoke: ")));
}

#[tokio::test]
async fn revoking_twice_fails() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;
  let id = s
    .record_event(NewScoreEvent::new(1, attendance, 2, "t"), origin())
    .await
    .unwrap();

  let revoked = s.revoke_event(id, origin()).await.unwrap();
  assert_eq!(revoked.score, 2);

  let err = s.revoke_event(id, origin()).await.unwrap_err();
  assert!(matches!(err, CoreError::EventNotFound(e) if e == id));
  assert_eq!(net_total(&s, 1).await, 0);
}

#[tokio::test]
async fn concurrent_revokes_apply_once() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;
  let id = s
    .record_event(NewScoreEvent::new(1, attendance, 6, "t"), origin())
    .await
    .unwrap();

  let (a, b) = tokio::join!(
    s.revoke_event(id, origin()),
    s.revoke_event(id, origin())
  );
  assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
  let err = a.err().or(b.err()).unwrap();
  assert!(err.is_not_found());

  let revokes = logs(&s, LogQuery {
    action: Some(ActionKind::Revoke),
    ..Default::default()
  })
  .await;
  assert_eq!(revokes.len(), 1);
  assert_eq!(net_total(&s, 1).await, 0);
}

#[tokio::test]
async fn other_categories_require_a_note() {
  let s = store().await;
  let other = category(&s, OTHER_SUBTRACT).await;

  let err = s
    .record_event(NewScoreEvent::new(1, other, 1, "t"), origin())
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Validation(_)));

  let err = s
    .record_event(NewScoreEvent::new(1, other, 1, "t").with_note("   "), origin())
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Validation(_)));

  s.record_event(
    NewScoreEvent::new(1, other, 1, "t").with_note("threw chalk"),
    origin(),
  )
  .await
  .unwrap();
  assert_eq!(net_total(&s, 1).await, -1);

  let events = s.list_events(&EventQuery::default()).await.unwrap();
  assert_eq!(events[0].event.note.as_deref(), Some("threw chalk"));
}

#[tokio::test]
async fn unknown_references_are_not_found() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;

  let err = s
    .record_event(NewScoreEvent::new(999, attendance, 1, "t"), origin())
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::StudentNotFound(999)));

  let err = s
    .record_event(NewScoreEvent::new(1, 999, 1, "t"), origin())
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::CategoryNotFound(999)));

  assert!(logs(&s, LogQuery::default()).await.is_empty());
}

#[tokio::test]
async fn batch_is_all_or_nothing() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;

  let err = s
    .record_batch(
      NewScoreBatch {
        student_ids: vec![1, 2, 999],
        category_id: attendance,
        score:       2,
        operator:    "t".into(),
        note:        None,
      },
      origin(),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::StudentNotFound(999)));
  assert!(s.list_events(&EventQuery::default()).await.unwrap().is_empty());
  assert!(logs(&s, LogQuery::default()).await.is_empty());

  let written = s
    .record_batch(
      NewScoreBatch {
        student_ids: vec![1, 2, 2, 3],
        category_id: attendance,
        score:       2,
        operator:    "t".into(),
        note:        None,
      },
      origin(),
    )
    .await
    .unwrap();
  assert_eq!(written, 3);
  assert_eq!(net_total(&s, 2).await, 2);
  assert_eq!(logs(&s, LogQuery::default()).await.len(), 3);
}

#[tokio::test]
async fn list_events_filters_and_limits() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;
  for (student, score) in [(1, 1), (2, 2), (1, 3)] {
    s.record_event(NewScoreEvent::new(student, attendance, score, "t"), origin())
      .await
      .unwrap();
  }

  let alice = s
    .list_events(&EventQuery {
      student_id: Some(1),
      limit:      None,
    })
    .await
    .unwrap();
  let scores: Vec<_> = alice.iter().map(|v| v.event.score).collect();
  assert_eq!(scores, vec![3, 1]);
  assert_eq!(alice[0].category_name, "Attendance");

  let latest = s
    .list_events(&EventQuery {
      student_id: None,
      limit:      Some(1),
    })
    .await
    .unwrap();
  assert_eq!(latest.len(), 1);
  assert_eq!(latest[0].event.score, 3);
}

#[tokio::test]
async fn oversized_paging_saturates() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;
  s.record_event(NewScoreEvent::new(1, attendance, 2, "t"), origin())
    .await
    .unwrap();

  let all = s
    .list_events(&EventQuery {
      student_id: None,
      limit:      Some(usize::MAX),
    })
    .await
    .unwrap();
  assert_eq!(all.len(), 1);

  let everything = logs(&s, LogQuery {
    limit: Some(usize::MAX),
    ..Default::default()
  })
  .await;
  assert!(!everything.is_empty());

  let past_the_end = logs(&s, LogQuery {
    offset: Some(usize::MAX),
    ..Default::default()
  })
  .await;
  assert!(past_the_end.is_empty());
}

#[tokio::test]
async fn standings_rank_by_net_then_id() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;
  for (student, score) in [(3, 2), (2, 5), (1, 2)] {
    s.record_event(NewScoreEvent::new(student, attendance, score, "t"), origin())
      .await
      .unwrap();
  }

  let ids: Vec<_> = s
    .student_aggregates()
    .await
    .unwrap()
    .iter()
    .take(4)
    .map(|t| t.student_id)
    .collect();
  assert_eq!(ids, vec![2, 1, 3, 4]);
}

#[tokio::test]
async fn add_student_rejects_duplicates() {
  let s = store().await;
  let zed = s
    .add_student("  Zed ".into(), origin().with_actor("admin"))
    .await
    .unwrap();
  assert_eq!(zed.name, "Zed");
  assert_eq!(s.get_student(zed.id).await.unwrap(), Some(zed.clone()));

  let err = s.add_student("Zed".into(), origin()).await.unwrap_err();
  assert!(matches!(err, CoreError::Validation(_)));

  let entries = logs(&s, LogQuery {
    action: Some(ActionKind::System),
    ..Default::default()
  })
  .await;
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0].student_id, zed.id);
  assert_eq!(entries[0].operator, "admin");
}

#[tokio::test]
async fn reset_keeps_login_entries() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;
  s.append_log(NewLogEntry::login("class", &origin()))
    .await
    .unwrap();
  s.record_event(NewScoreEvent::new(1, attendance, 4, "t"), origin())
    .await
    .unwrap();

  s.reset_all().await.unwrap();

  assert_eq!(net_total(&s, 1).await, 0);
  assert!(s.list_events(&EventQuery::default()).await.unwrap().is_empty());
  let remaining = logs(&s, LogQuery::default()).await;
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].action, ActionKind::Login);
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshots_are_immutable() {
  let s = store().await;
  let attendance = category(&s, "Attendance").await;
  s.record_event(NewScoreEvent::new(1, attendance, 4, "t"), origin())
    .await
    .unwrap();

  let batch = s.capture_snapshot("week1".into(), origin()).await.unwrap();
  let before = s.get_snapshot_batch(batch.snapshot_time).await.unwrap();

  s.record_event(NewScoreEvent::new(1, attendance, 10, "t"), origin())
    .await
    .unwrap();
  s.capture_snapshot("week2".into(), origin()).await.unwrap();

  let after = s.get_snapshot_batch(batch.snapshot_time).await.unwrap();
  assert_eq!(before, after);

  let rejected = s
    .with_conn(|conn| {
      conn.execute("UPDATE monthly_snapshots SET total_score = 0", [])?;
      Ok(())
    })
    .await;
  assert!(rejected.is_err());

  let batches = s.list_snapshot_batches().await.unwrap();
  let titles: Vec<_> = batches.iter().map(|b| b.title.as_str()).collect();
  assert_eq!(titles, vec!["week2", "week1"]);
  assert_eq!(batches[1], batch);
}

#[tokio::test]
async fn snapshot_lookup_misses_are_empty() {
  let s = store().await;
  let rows = s.get_snapshot_batch(Utc::now()).await.unwrap();
  assert!(rows.is_empty());

  let err = s
    .capture_snapshot("  ".into(), origin())
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Validation(_)));
  assert!(s.list_snapshot_batches().await.unwrap().is_empty());
}

#[tokio::test]
async fn imported_snapshot_keys_resolve() {
  let s = store().await;
  s.with_conn(|conn| {
    conn.execute_batch(
      "INSERT INTO monthly_snapshots (
         snapshot_time, title, month, student_name,
         add_score, minus_score, total_score, created_at
       ) VALUES
         ('2024-05-01T10:00:00.123Z', 'iso-ms', '2024-05', 'Alice', 4, 1, 3,
          '2024-05-01T10:00:00.123Z'),
         ('2024-05-01T10:00:00.123Z', 'iso-ms', '2024-05', 'Bob', 9, 0, 9,
          '2024-05-01T10:00:00.123Z'),
         ('2024-04-01 09:00:00', 'sqlite', '2024-04', 'Alice', 2, 0, 2,
          '2024-04-01 09:00:00');",
    )?;
    Ok(())
  })
  .await
  .unwrap();

  let batches = s.list_snapshot_batches().await.unwrap();
  let titles: Vec<_> = batches.iter().map(|b| b.title.as_str()).collect();
  assert_eq!(titles, vec!["iso-ms", "sqlite"]);

  let iso = s.get_snapshot_batch(batches[0].snapshot_time).await.unwrap();
  let names: Vec<_> = iso.iter().map(|r| r.student_name.as_str()).collect();
  assert_eq!(names, vec!["Bob", "Alice"]);

  let plain = s.get_snapshot_batch(batches[1].snapshot_time).await.unwrap();
  assert_eq!(plain.len(), 1);
  assert_eq!(plain[0].total_score, 2);
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn setup_then_update_settings() {
  let s = store().await;
  assert!(matches!(
    s.load_settings().await.unwrap_err(),
    CoreError::Validation(_)
  ));
  assert!(!s.schema_status().await.unwrap().configured);

  s.complete_setup(settings()).await.unwrap();
  assert!(s.schema_status().await.unwrap().configured);
  assert_eq!(s.load_settings().await.unwrap(), settings());

  let err = s.complete_setup(settings()).await.unwrap_err();
  assert!(matches!(err, CoreError::Validation(_)));

  let updated = s
    .update_settings(
      SettingsPatch {
        class_name: Some("7B".into()),
        ..Default::default()
      },
      origin().with_actor("admin"),
    )
    .await
    .unwrap();
  assert_eq!(updated.class_name, "7B");
  assert_eq!(updated.site_title, "Room 12");

  let entries = logs(&s, LogQuery::default()).await;
  assert_eq!(entries.len(), 1);
  assert!(entries[0].note.as_deref().unwrap().contains("class_name"));
}

#[tokio::test]
async fn update_before_setup_fails() {
  let s = store().await;
  let err = s
    .update_settings(
      SettingsPatch {
        site_title: Some("x".into()),
        ..Default::default()
      },
      origin(),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Validation(_)));
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_upsert_load_delete() {
  let s = store().await;
  let now = Utc::now();
  let mut session = IpSession {
    ip:       "10.0.0.9".into(),
    username: "class".into(),
    role:     Role::Class,
    expires:  now + Duration::days(1),
  };
  s.upsert_session(session.clone()).await.unwrap();

  session.role = Role::Admin;
  s.upsert_session(session.clone()).await.unwrap();
  let loaded = s.load_session("10.0.0.9").await.unwrap().unwrap();
  assert_eq!(loaded.role, Role::Admin);

  s.delete_session("10.0.0.9").await.unwrap();
  assert!(s.load_session("10.0.0.9").await.unwrap().is_none());
  s.delete_session("10.0.0.9").await.unwrap();
}

#[tokio::test]
async fn session_expires_at_its_deadline() {
  let s = store().await;
  let expires = Utc::now() + Duration::hours(1);
  s.upsert_session(IpSession {
    ip: "10.0.0.2".into(),
    username: "class".into(),
    role: Role::Class,
    expires,
  })
  .await
  .unwrap();

  let before = expires - Duration::seconds(1);
  assert!(resolve_session(&s, "10.0.0.2", before).await.unwrap().is_some());
  assert!(resolve_session(&s, "10.0.0.2", expires).await.unwrap().is_none());
  // The expired row stays until overwritten.
  assert!(s.load_session("10.0.0.2").await.unwrap().is_some());
}

#[tokio::test]
async fn gate_login_and_logout() {
  let s = store().await;
  s.complete_setup(settings()).await.unwrap();
  let creds = s.load_settings().await.unwrap().credentials;
  let gate = AccessGate::new(&s, creds);
  let now = Utc::now();

  assert!(gate.login("class", "wrong", &origin(), now).await.unwrap().is_none());
  assert!(logs(&s, LogQuery::default()).await.is_empty());

  let session = gate
    .login("class", "chalk", &origin(), now)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(session.role, Role::Class);
  assert_eq!(session.ip, "10.0.0.1");

  let admin = gate
    .login("", "board", &RequestOrigin::new("10.0.0.3", "ua"), now)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(admin.role, Role::Admin);
  assert_eq!(admin.username, "admin");

  let logins = logs(&s, LogQuery {
    action: Some(ActionKind::Login),
    ..Default::default()
  })
  .await;
  assert_eq!(logins.len(), 2);

  assert!(gate.resolve("10.0.0.1", now).await.unwrap().is_some());
  gate.logout("10.0.0.1").await.unwrap();
  assert!(gate.resolve("10.0.0.1", now).await.unwrap().is_none());
}

#[tokio::test]
async fn class_logins_from_several_ips_are_independent() {
  let s = store().await;
  s.complete_setup(settings()).await.unwrap();
  let creds = s.load_settings().await.unwrap().credentials;
  let gate = AccessGate::new(&s, creds);
  let now = Utc::now();

  for ip in ["10.0.0.1", "10.0.0.2"] {
    let session = gate
      .login("class", "chalk", &RequestOrigin::new(ip, "ua"), now)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(session.role, Role::Class);
  }
  assert!(gate.resolve("10.0.0.1", now).await.unwrap().is_some());
  assert!(gate.resolve("10.0.0.2", now).await.unwrap().is_some());

  gate.logout("10.0.0.1").await.unwrap();
  assert!(gate.resolve("10.0.0.1", now).await.unwrap().is_none());
  let remaining = gate.resolve("10.0.0.2", now).await.unwrap().unwrap();
  assert_eq!(remaining.username, "class");
}

#[tokio::test]
async fn gate_usernames() {
  let s = store().await;
  s.complete_setup(settings()).await.unwrap();
  let creds = s.load_settings().await.unwrap().credentials;
  let gate = AccessGate::new(&s, creds);

  assert_eq!(gate.authenticate("somebody", "board"), Some(Role::Admin));
  assert_eq!(gate.authenticate(" class ", "chalk"), Some(Role::Class));
  assert_eq!(gate.authenticate("somebody", "chalk"), None);

  let session = gate
    .login(" class ", "chalk", &origin(), Utc::now())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(session.role, Role::Class);
  assert_eq!(session.username, "class");
}
