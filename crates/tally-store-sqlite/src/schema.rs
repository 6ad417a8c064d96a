//! SQL schema for the Tally SQLite store.
//!
//! Table and column names match the layout of existing deployments so their
//! data can be opened in place. Additions are made with defaults and
//! backfilled by [`crate::SqliteStore::ensure_schema`].

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS students (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS score_categories (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL UNIQUE,
    type          TEXT NOT NULL CHECK (type IN ('add', 'minus')),
    weight        REAL NOT NULL DEFAULT 1,
    requires_note INTEGER NOT NULL DEFAULT 0
);

-- Rows are inserted, or deleted by revocation. Never updated.
CREATE TABLE IF NOT EXISTS score_records (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  INTEGER NOT NULL REFERENCES students(id),
    category_id INTEGER NOT NULL REFERENCES score_categories(id),
    score       INTEGER NOT NULL CHECK (score > 0),
    operator    TEXT NOT NULL,
    note        TEXT,
    created_at  TEXT NOT NULL     -- RFC 3339 UTC; server-assigned
);

-- Append-only. student_id = 0 marks system-level entries, so no FK.
CREATE TABLE IF NOT EXISTS operation_logs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id    INTEGER NOT NULL DEFAULT 0,
    action_type   TEXT NOT NULL,  -- login | add | subtract | revoke | task | system
    score_change  INTEGER NOT NULL DEFAULT 0,
    operator      TEXT NOT NULL DEFAULT '',
    category_name TEXT NOT NULL DEFAULT '',
    note          TEXT,
    ip_address    TEXT NOT NULL DEFAULT '',
    user_agent    TEXT NOT NULL DEFAULT '',
    created_at    TEXT NOT NULL
);

-- Write-once; one row per (snapshot_time, student).
CREATE TABLE IF NOT EXISTS monthly_snapshots (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    snapshot_time TEXT NOT NULL,
    title         TEXT NOT NULL,
    month         TEXT NOT NULL,  -- YYYY-MM
    student_name  TEXT NOT NULL,
    add_score     INTEGER NOT NULL,
    minus_score   INTEGER NOT NULL,
    total_score   INTEGER NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS monthly_snapshots_write_once
BEFORE UPDATE ON monthly_snapshots
BEGIN
    SELECT RAISE(ABORT, 'snapshot rows are write-once');
END;

CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ip_sessions (
    ip       TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    role     TEXT NOT NULL,       -- class | admin
    expires  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS score_records_student_idx ON score_records(student_id);
CREATE INDEX IF NOT EXISTS operation_logs_student_idx ON operation_logs(student_id);
CREATE INDEX IF NOT EXISTS operation_logs_action_idx  ON operation_logs(action_type);
CREATE INDEX IF NOT EXISTS monthly_snapshots_time_idx ON monthly_snapshots(snapshot_time);

PRAGMA user_version = 1;
";
