//! [`SqliteStore`]: the SQLite implementation of [`SnapshotStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use wynnsync_core::{
  changelog::ChangeEvent,
  collection::{CollectionKind, CollectionRef, UpsertPolicy},
  presence::{LAST_SEEN_FIELD, OnlineCount, PresenceUpdate, PresenceWrite},
  snapshot::{CurrentState, EntityKey, Record, Snapshot},
  store::SnapshotStore,
};

use crate::{
  Result,
  encode::{
    RawChangeEvent, RawCurrentState, decode_record, encode_record,
    online_count_from_row,
  },
  schema::SCHEMA,
};

// ─── SQL ─────────────────────────────────────────────────────────────────────

const UPSERT_REPLACE_DOCUMENT: &str =
  "INSERT INTO current_state
     (collection, scope, entity_key, record_json, derived_json, updated_at)
   VALUES (?1, ?2, ?3, ?4, '{}', ?5)
   ON CONFLICT (collection, scope, entity_key) DO UPDATE SET
     record_json  = excluded.record_json,
     derived_json = '{}',
     updated_at   = excluded.updated_at";

const UPSERT_KEEP_DERIVED: &str =
  "INSERT INTO current_state
     (collection, scope, entity_key, record_json, derived_json, updated_at)
   VALUES (?1, ?2, ?3, ?4, '{}', ?5)
   ON CONFLICT (collection, scope, entity_key) DO UPDATE SET
     record_json = excluded.record_json,
     updated_at  = excluded.updated_at";

fn upsert_sql(policy: UpsertPolicy) -> &'static str {
  match policy {
    UpsertPolicy::ReplaceDocument => UPSERT_REPLACE_DOCUMENT,
    UpsertPolicy::KeepDerived => UPSERT_KEEP_DERIVED,
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A wynnsync store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Encode every record up front so the blocking closure only does I/O.
  fn encode_rows<'a>(
    rows: impl Iterator<Item = (&'a EntityKey, &'a Record)>,
  ) -> Result<Vec<(String, String)>> {
    rows
      .map(|(key, record)| -> Result<(String, String)> {
        Ok((key.as_str().to_owned(), encode_record(record)?))
      })
      .collect()
  }
}

// ─── SnapshotStore impl ──────────────────────────────────────────────────────

impl SnapshotStore for SqliteStore {
  type Error = crate::Error;

  // ── Current state ─────────────────────────────────────────────────────────

  async fn load_previous(&self, target: &CollectionRef) -> Result<Snapshot> {
    let collection = target.kind.as_str();
    let scope      = target.scope.clone();

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entity_key, record_json FROM current_state
           WHERE collection = ?1 AND scope = ?2
           ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![collection, scope], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(key, json)| -> Result<(EntityKey, Record)> {
        let record = decode_record(&key, &json)?;
        Ok((EntityKey::new(key), record))
      })
      .collect()
  }

  async fn load_one(
    &self,
    target: &CollectionRef,
    key:    &EntityKey,
  ) -> Result<Option<CurrentState>> {
    let collection = target.kind.as_str();
    let scope      = target.scope.clone();
    let key_str    = key.as_str().to_owned();

    let raw: Option<RawCurrentState> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT entity_key, record_json, derived_json, updated_at
             FROM current_state
             WHERE collection = ?1 AND scope = ?2 AND entity_key = ?3",
            rusqlite::params![collection, scope, key_str],
            |row| {
              Ok(RawCurrentState {
                entity_key:   row.get(0)?,
                record_json:  row.get(1)?,
                derived_json: row.get(2)?,
                updated_at:   row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCurrentState::into_current).transpose()
  }

  async fn upsert(
    &self,
    target: &CollectionRef,
    key:    &EntityKey,
    record: &Record,
  ) -> Result<()> {
    let sql         = upsert_sql(target.kind.upsert_policy());
    let collection  = target.kind.as_str();
    let scope       = target.scope.clone();
    let key_str     = key.as_str().to_owned();
    let record_json = encode_record(record)?;
    let now         = Utc::now().timestamp();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          sql,
          rusqlite::params![collection, scope, key_str, record_json, now],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_all(&self, target: &CollectionRef, snapshot: &Snapshot) -> Result<usize> {
    if snapshot.is_empty() {
      return Ok(0);
    }

    let sql        = upsert_sql(target.kind.upsert_policy());
    let collection = target.kind.as_str();
    let scope      = target.scope.clone();
    let rows       = Self::encode_rows(snapshot.iter())?;
    let now        = Utc::now().timestamp();

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0;
        {
          let mut stmt = tx.prepare(sql)?;
          for (key, record_json) in &rows {
            written += stmt.execute(rusqlite::params![
              collection,
              scope,
              key,
              record_json,
              now
            ])?;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn remove_keys(&self, target: &CollectionRef, keys: &[EntityKey]) -> Result<usize> {
    if keys.is_empty() {
      return Ok(0);
    }

    let collection = target.kind.as_str();
    let scope      = target.scope.clone();
    let keys: Vec<String> = keys.iter().map(|k| k.as_str().to_owned()).collect();

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
          let mut stmt = tx.prepare(
            "DELETE FROM current_state
             WHERE collection = ?1 AND scope = ?2 AND entity_key = ?3",
          )?;
          for key in &keys {
            removed += stmt.execute(rusqlite::params![collection, scope, key])?;
          }
        }
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    Ok(removed)
  }

  async fn list_scopes(&self, kind: CollectionKind) -> Result<Vec<String>> {
    let collection = kind.as_str();

    let scopes = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT scope FROM current_state
           WHERE collection = ?1 ORDER BY scope",
        )?;
        let scopes = stmt
          .query_map(rusqlite::params![collection], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(scopes)
      })
      .await?;
    Ok(scopes)
  }

  // ── Changelog ─────────────────────────────────────────────────────────────

  async fn append_changelog(
    &self,
    target: &CollectionRef,
    events: &[ChangeEvent],
  ) -> Result<usize> {
    if events.is_empty() {
      return Ok(0);
    }

    let collection = target.kind.as_str();
    let scope      = target.scope.clone();
    let rows: Vec<(i64, String, &'static str, String)> = events
      .iter()
      .map(|e| -> Result<(i64, String, &'static str, String)> {
        Ok((
          e.timestamp,
          e.entity_key.as_str().to_owned(),
          e.status.as_str(),
          serde_json::to_string(&e.payload)?,
        ))
      })
      .collect::<Result<_>>()?;

    // No enclosing transaction: rows inserted before a failure stay.
    let written = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "INSERT INTO changelog
             (collection, scope, timestamp, entity_key, status, payload_json)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut written = 0;
        for (timestamp, key, status, payload) in &rows {
          written += stmt.execute(rusqlite::params![
            collection, scope, timestamp, key, status, payload
          ])?;
        }
        Ok(written)
      })
      .await?;
    Ok(written)
  }

  async fn changelog(
    &self,
    target: &CollectionRef,
    since:  Option<i64>,
  ) -> Result<Vec<ChangeEvent>> {
    let collection = target.kind.as_str();
    let scope      = target.scope.clone();
    let since      = since.unwrap_or(i64::MIN);

    let raws: Vec<RawChangeEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT timestamp, entity_key, status, payload_json
           FROM changelog
           WHERE collection = ?1 AND scope = ?2 AND timestamp >= ?3
           ORDER BY changelog_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![collection, scope, since], |row| {
            Ok(RawChangeEvent {
              timestamp:    row.get(0)?,
              entity_key:   row.get(1)?,
              status:       row.get(2)?,
              payload_json: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChangeEvent::into_event).collect()
  }

  // ── Presence ──────────────────────────────────────────────────────────────

  async fn record_presence(
    &self,
    updates:   &[PresenceUpdate],
    timestamp: i64,
  ) -> Result<PresenceWrite> {
    if updates.is_empty() {
      return Ok(PresenceWrite::default());
    }

    let collection = CollectionKind::GuildMember.as_str();
    let path       = format!("$.{LAST_SEEN_FIELD}");
    let updates    = updates.to_vec();

    let write = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut write = PresenceWrite::default();
        {
          let mut touch = tx.prepare(
            "UPDATE current_state
             SET derived_json = json_set(derived_json, ?1, ?2)
             WHERE collection = ?3 AND scope = ?4 AND entity_key = ?5",
          )?;
          let mut count = tx.prepare(
            "INSERT INTO online_counts (guild_key, guild_name, timestamp, count)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for update in &updates {
            for member in &update.online {
              write.members_touched += touch.execute(rusqlite::params![
                path,
                timestamp,
                collection,
                update.guild_key,
                member.as_str()
              ])?;
            }
            write.counts_appended += count.execute(rusqlite::params![
              update.guild_key,
              update.guild_name,
              timestamp,
              update.count() as i64
            ])?;
          }
        }
        tx.commit()?;
        Ok(write)
      })
      .await?;
    Ok(write)
  }

  async fn online_counts(&self, guild_key: &str) -> Result<Vec<OnlineCount>> {
    let guild_key = guild_key.to_owned();

    let counts = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT guild_key, guild_name, timestamp, count FROM online_counts
           WHERE guild_key = ?1 ORDER BY timestamp, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![guild_key], online_count_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(counts)
  }

  async fn prune_online_counts(&self, older_than: i64) -> Result<usize> {
    let pruned = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM online_counts WHERE timestamp < ?1",
          rusqlite::params![older_than],
        )?)
      })
      .await?;
    Ok(pruned)
  }
}
