//! SQL schema for the Parley SQLite store.
//!
//! Applied on every (re)connect; idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`. `foreign_keys` is a per-connection setting
//! and must be switched on each time.

/// Full schema DDL.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS threads (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    uri     TEXT NOT NULL UNIQUE,
    title   TEXT
);

CREATE TABLE IF NOT EXISTS comments (
    tid          INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    parent       INTEGER REFERENCES comments(id),  -- always a top-level comment
    created      REAL NOT NULL,
    modified     REAL,
    mode         INTEGER NOT NULL,                  -- 1 valid | 2 pending | 4 tombstoned
    remote_addr  TEXT,
    text         TEXT,
    author       TEXT,
    email        TEXT,
    website      TEXT,
    likes        INTEGER NOT NULL DEFAULT 0,
    dislikes     INTEGER NOT NULL DEFAULT 0,
    voters       BLOB NOT NULL,                     -- bloom filter over voter addresses
    notification INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS preferences (
    key     TEXT PRIMARY KEY,
    value   TEXT
);

CREATE INDEX IF NOT EXISTS comments_tid_idx    ON comments(tid);
CREATE INDEX IF NOT EXISTS comments_parent_idx ON comments(parent);
CREATE INDEX IF NOT EXISTS comments_email_idx  ON comments(email);

PRAGMA user_version = 1;
";
