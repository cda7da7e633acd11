//! SQL schema for the wynnsync SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Exactly zero or one row per (collection, scope, entity_key).
CREATE TABLE IF NOT EXISTS current_state (
    collection   TEXT    NOT NULL,   -- CollectionKind::as_str
    scope        TEXT    NOT NULL,   -- guild uuid, class name, or ''
    entity_key   TEXT    NOT NULL,
    record_json  TEXT    NOT NULL,   -- upstream record, replaced wholesale
    derived_json TEXT    NOT NULL DEFAULT '{}',  -- e.g. lastSeen
    updated_at   INTEGER NOT NULL,
    PRIMARY KEY (collection, scope, entity_key)
);

-- Changelog rows are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS changelog (
    changelog_id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection   TEXT    NOT NULL,
    scope        TEXT    NOT NULL,
    timestamp    INTEGER NOT NULL,   -- shared by every event of one run
    entity_key   TEXT    NOT NULL,
    status       TEXT    NOT NULL,   -- 'add' | 'remove' | 'modify'
    payload_json TEXT    NOT NULL
);

-- Append-only time series, pruned by age.
CREATE TABLE IF NOT EXISTS online_counts (
    guild_key  TEXT    NOT NULL,
    guild_name TEXT,
    timestamp  INTEGER NOT NULL,
    count      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS changelog_target_idx ON changelog(collection, scope, timestamp);
CREATE INDEX IF NOT EXISTS online_counts_guild_idx ON online_counts(guild_key, timestamp);
CREATE INDEX IF NOT EXISTS online_counts_ts_idx    ON online_counts(timestamp);

PRAGMA user_version = 1;
";
