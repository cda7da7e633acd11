//! Entity keys, canonical records, and snapshots.
//!
//! A [`Snapshot`] is the full keyed state of one collection at one point in
//! time. Keys are unique by construction: inserting an existing key replaces
//! its record in place (last write wins).

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── EntityKey ───────────────────────────────────────────────────────────────

/// A stable natural identifier scoped to one collection: a player or guild
/// UUID, an item name, an aspect id. Opaque to the core.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
  pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for EntityKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for EntityKey {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for EntityKey {
  fn from(s: String) -> Self { Self(s) }
}

impl std::borrow::Borrow<str> for EntityKey {
  fn borrow(&self) -> &str { &self.0 }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// One entity's state: field name to scalar or nested value. Compared by deep
/// structural equality.
pub type Record = Map<String, Value>;

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Full keyed state of one collection. Iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
  records: IndexMap<EntityKey, Record>,
}

impl Snapshot {
  pub fn new() -> Self { Self::default() }

  /// Insert or overwrite the record for `key`.
  pub fn insert(&mut self, key: impl Into<EntityKey>, record: Record) {
    self.records.insert(key.into(), record);
  }

  pub fn get(&self, key: &str) -> Option<&Record> { self.records.get(key) }

  pub fn contains_key(&self, key: &str) -> bool {
    self.records.contains_key(key)
  }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
    self.records.keys()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &Record)> {
    self.records.iter()
  }
}

impl FromIterator<(EntityKey, Record)> for Snapshot {
  fn from_iter<I: IntoIterator<Item = (EntityKey, Record)>>(iter: I) -> Self {
    Self { records: iter.into_iter().collect() }
  }
}

impl IntoIterator for Snapshot {
  type Item = (EntityKey, Record);
  type IntoIter = indexmap::map::IntoIter<EntityKey, Record>;

  fn into_iter(self) -> Self::IntoIter { self.records.into_iter() }
}

impl<'a> IntoIterator for &'a Snapshot {
  type Item = (&'a EntityKey, &'a Record);
  type IntoIter = indexmap::map::Iter<'a, EntityKey, Record>;

  fn into_iter(self) -> Self::IntoIter { self.records.iter() }
}

// ─── CurrentState ────────────────────────────────────────────────────────────

/// The persisted current-state row for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
  pub key:        EntityKey,
  /// The upstream record as last observed.
  pub record:     Record,
  /// Annotations attached outside the upstream sync (e.g. `lastSeen`).
  pub derived:    Record,
  /// Seconds since the epoch at which the row was last written.
  pub updated_at: i64,
}
