//! The `SnapshotStore` trait: current state, changelog, and presence series.
//!
//! The trait is implemented by storage backends (e.g.
//! `wynnsync-store-sqlite`). The orchestrator depends on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use crate::{
  changelog::ChangeEvent,
  collection::{CollectionKind, CollectionRef},
  presence::{OnlineCount, PresenceUpdate, PresenceWrite},
  snapshot::{CurrentState, EntityKey, Record, Snapshot},
};

/// Abstraction over the persistent store.
///
/// Invariant: at most one current-state row exists per (collection, scope,
/// key). Changelog writes are append-only; nothing here updates or deletes
/// a changelog row.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tokio tasks.
pub trait SnapshotStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Current state ─────────────────────────────────────────────────────

  /// Load every current-state record of a collection as a snapshot.
  fn load_previous<'a>(
    &'a self,
    target: &'a CollectionRef,
  ) -> impl Future<Output = Result<Snapshot, Self::Error>> + Send + 'a;

  /// Point lookup of one current-state row. Returns `None` if absent.
  fn load_one<'a>(
    &'a self,
    target: &'a CollectionRef,
    key: &'a EntityKey,
  ) -> impl Future<Output = Result<Option<CurrentState>, Self::Error>> + Send + 'a;

  /// Insert or replace the current-state row for `key`, applying the
  /// collection's [`UpsertPolicy`](crate::collection::UpsertPolicy).
  fn upsert<'a>(
    &'a self,
    target: &'a CollectionRef,
    key: &'a EntityKey,
    record: &'a Record,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Bulk [`upsert`](Self::upsert) of every record in `snapshot`. Returns the
  /// number of rows written.
  fn upsert_all<'a>(
    &'a self,
    target: &'a CollectionRef,
    snapshot: &'a Snapshot,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Drop the current-state rows (and derived annotations) for `keys`.
  fn remove_keys<'a>(
    &'a self,
    target: &'a CollectionRef,
    keys: &'a [EntityKey],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Every scope that has at least one current-state row of `kind`.
  fn list_scopes(
    &self,
    kind: CollectionKind,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Changelog (append-only) ───────────────────────────────────────────

  /// Append `events`. Rows accepted before a failure remain persisted.
  fn append_changelog<'a>(
    &'a self,
    target: &'a CollectionRef,
    events: &'a [ChangeEvent],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Read back changelog entries, oldest first, optionally only those at or
  /// after `since`.
  fn changelog<'a>(
    &'a self,
    target: &'a CollectionRef,
    since: Option<i64>,
  ) -> impl Future<Output = Result<Vec<ChangeEvent>, Self::Error>> + Send + 'a;

  // ── Presence ──────────────────────────────────────────────────────────

  /// Set `lastSeen = timestamp` on every online roster member and append one
  /// online-count row per update, as a single batch.
  fn record_presence<'a>(
    &'a self,
    updates: &'a [PresenceUpdate],
    timestamp: i64,
  ) -> impl Future<Output = Result<PresenceWrite, Self::Error>> + Send + 'a;

  /// A guild's online-count series, oldest first.
  fn online_counts<'a>(
    &'a self,
    guild_key: &'a str,
  ) -> impl Future<Output = Result<Vec<OnlineCount>, Self::Error>> + Send + 'a;

  /// Delete online-count rows with `timestamp < older_than`.
  fn prune_online_counts(
    &self,
    older_than: i64,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
