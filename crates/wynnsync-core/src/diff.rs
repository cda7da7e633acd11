//! Snapshot differ: previous + current snapshot → ordered changes.
//!
//! Changes are grouped: every add, then every remove, then every modify.
//! Within a group the order follows the snapshot the keys are drawn from.
//! Detection compares noise-stripped copies; the emitted records are always
//! the unstripped originals.

use serde::{Deserialize, Serialize};

use crate::{
  canonical::equivalent,
  changelog::ChangeStatus,
  collection::FieldPath,
  snapshot::{EntityKey, Record, Snapshot},
};

/// One detected difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Change {
  /// Present in current, absent in previous.
  Add { key: EntityKey, record: Record },
  /// Present in previous, absent in current. Carries the last-known record.
  Remove { key: EntityKey, record: Record },
  /// Present in both with non-equivalent records.
  Modify {
    key:    EntityKey,
    before: Record,
    after:  Record,
  },
}

impl Change {
  pub fn key(&self) -> &EntityKey {
    match self {
      Self::Add { key, .. } | Self::Remove { key, .. } | Self::Modify { key, .. } => key,
    }
  }

  pub fn status(&self) -> ChangeStatus {
    match self {
      Self::Add { .. } => ChangeStatus::Add,
      Self::Remove { .. } => ChangeStatus::Remove,
      Self::Modify { .. } => ChangeStatus::Modify,
    }
  }
}

/// Compute the changes that transform `previous` into `current`.
///
/// An empty `previous` yields exactly one [`Change::Add`] per current key.
pub fn diff(
  previous: &Snapshot,
  current: &Snapshot,
  noise: &[FieldPath],
) -> Vec<Change> {
  let added = current
    .iter()
    .filter(|(key, _)| !previous.contains_key(key.as_str()))
    .map(|(key, record)| Change::Add {
      key:    key.clone(),
      record: record.clone(),
    });

  let removed = previous
    .iter()
    .filter(|(key, _)| !current.contains_key(key.as_str()))
    .map(|(key, record)| Change::Remove {
      key:    key.clone(),
      record: record.clone(),
    });

  let modified = current.iter().filter_map(|(key, after)| {
    let before = previous.get(key.as_str())?;
    if equivalent(before, after, noise) {
      return None;
    }
    Some(Change::Modify {
      key:    key.clone(),
      before: before.clone(),
      after:  after.clone(),
    })
  });

  added.chain(removed).chain(modified).collect()
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// How every key in `previous ∪ current` was classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
  pub added:     usize,
  pub removed:   usize,
  pub modified:  usize,
  pub unchanged: usize,
}

impl DiffStats {
  pub fn tally(changes: &[Change], previous: &Snapshot, current: &Snapshot) -> Self {
    let mut stats = Self::default();
    for change in changes {
      match change.status() {
        ChangeStatus::Add => stats.added += 1,
        ChangeStatus::Remove => stats.removed += 1,
        ChangeStatus::Modify => stats.modified += 1,
      }
    }
    let shared = current
      .keys()
      .filter(|k| previous.contains_key(k.as_str()))
      .count();
    stats.unchanged = shared - stats.modified;
    stats
  }

  pub fn total_changes(&self) -> usize {
    self.added + self.removed + self.modified
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
