//! Tracked collections and their per-collection policies.
//!
//! Every collection carries a fixed list of noise paths (fields ignored when
//! deciding whether a record was modified) and an explicit upsert policy.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snapshot::Record;

// ─── FieldPath ───────────────────────────────────────────────────────────────

/// A path of object keys into a record, e.g. `icon.value.customModelData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath(pub &'static [&'static str]);

impl FieldPath {
  /// Remove the field at this path from `record`. Returns whether anything was
  /// removed. A missing or non-object intermediate segment means the field is
  /// absent.
  pub fn remove_from(&self, record: &mut Record) -> bool {
    let Some((last, parents)) = self.0.split_last() else {
      return false;
    };
    let mut cursor = record;
    for segment in parents {
      match cursor.get_mut(*segment) {
        Some(Value::Object(inner)) => cursor = inner,
        _ => return false,
      }
    }
    cursor.remove(*last).is_some()
  }

  /// Whether `record` has a value at this path.
  pub fn is_present(&self, record: &Record) -> bool {
    let Some((last, parents)) = self.0.split_last() else {
      return false;
    };
    let mut cursor = record;
    for segment in parents {
      match cursor.get(*segment) {
        Some(Value::Object(inner)) => cursor = inner,
        _ => return false,
      }
    }
    cursor.contains_key(*last)
  }
}

impl fmt::Display for FieldPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.join("."))
  }
}

const ICON_MODEL_DATA: FieldPath =
  FieldPath(&["icon", "value", "customModelData"]);

const GUILD_NOISE: &[FieldPath] = &[
  FieldPath(&["level"]),
  FieldPath(&["xpPercent"]),
  FieldPath(&["online"]),
  FieldPath(&["territories"]),
  FieldPath(&["wars"]),
];

const GUILD_MEMBER_NOISE: &[FieldPath] = &[
  FieldPath(&["online"]),
  FieldPath(&["server"]),
  FieldPath(&["contributed"]),
  FieldPath(&["contributionRank"]),
];

const CATALOG_NOISE: &[FieldPath] = &[ICON_MODEL_DATA];

const PLAYER_NOISE: &[FieldPath] = &[
  FieldPath(&["online"]),
  FieldPath(&["server"]),
  FieldPath(&["lastJoin"]),
  FieldPath(&["playtime"]),
];

// ─── UpsertPolicy ────────────────────────────────────────────────────────────

/// How a current-state row is replaced when a new record arrives.
///
/// In both cases the upstream record itself is replaced wholesale; the
/// policies differ only in what happens to derived annotations stored beside
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertPolicy {
  /// Replace the whole row; derived annotations are discarded.
  ReplaceDocument,
  /// Replace the upstream record; derived annotations survive.
  KeepDerived,
}

// ─── CollectionKind ──────────────────────────────────────────────────────────

/// The kind of entity collection being tracked.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
  /// Guild header (everything but the roster), keyed by guild UUID.
  Guild,
  /// Guild roster, keyed by member UUID and scoped by guild UUID.
  GuildMember,
  /// Item catalog, keyed by item name.
  Item,
  /// Aspect catalog, keyed by aspect id and scoped by class.
  Aspect,
  /// Player record, keyed by player UUID.
  Player,
}

impl CollectionKind {
  pub const ALL: [CollectionKind; 5] = [
    Self::Guild,
    Self::GuildMember,
    Self::Item,
    Self::Aspect,
    Self::Player,
  ];

  /// The name stored in the `collection` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Guild => "guild",
      Self::GuildMember => "guild_member",
      Self::Item => "item",
      Self::Aspect => "aspect",
      Self::Player => "player",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|k| k.as_str() == s)
  }

  /// Fields ignored when deciding whether a record was modified.
  pub fn noise_paths(self) -> &'static [FieldPath] {
    match self {
      Self::Guild => GUILD_NOISE,
      Self::GuildMember => GUILD_MEMBER_NOISE,
      Self::Item | Self::Aspect => CATALOG_NOISE,
      Self::Player => PLAYER_NOISE,
    }
  }

  pub fn upsert_policy(self) -> UpsertPolicy {
    match self {
      // Roster rows carry the presence pass's `lastSeen`.
      Self::GuildMember => UpsertPolicy::KeepDerived,
      Self::Guild | Self::Item | Self::Aspect | Self::Player => {
        UpsertPolicy::ReplaceDocument
      }
    }
  }
}

impl fmt::Display for CollectionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── CollectionRef ───────────────────────────────────────────────────────────

/// Identifies one snapshot: a collection kind plus a scope (guild UUID for
/// rosters, class name for aspects, empty otherwise).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionRef {
  pub kind:  CollectionKind,
  pub scope: String,
}

impl CollectionRef {
  /// An unscoped collection.
  pub fn global(kind: CollectionKind) -> Self {
    Self { kind, scope: String::new() }
  }

  pub fn scoped(kind: CollectionKind, scope: impl Into<String>) -> Self {
    Self { kind, scope: scope.into() }
  }
}

impl fmt::Display for CollectionRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.scope.is_empty() {
      write!(f, "{}", self.kind)
    } else {
      write!(f, "{}:{}", self.kind, self.scope)
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn record(v: Value) -> Record {
    match v {
      Value::Object(m) => m,
      _ => panic!("not an object"),
    }
  }

  #[test]
  fn remove_nested_path() {
    let mut r = record(json!({
      "icon": { "format": "attribute", "value": { "id": "x", "customModelData": 5 } }
    }));
    assert!(ICON_MODEL_DATA.is_present(&r));
    assert!(ICON_MODEL_DATA.remove_from(&mut r));
    assert!(!ICON_MODEL_DATA.is_present(&r));
    assert_eq!(r["icon"]["value"]["id"], "x");
  }

  #[test]
  fn non_object_intermediate_is_absent() {
    let mut r = record(json!({ "icon": { "value": "skin-hash" } }));
    assert!(!ICON_MODEL_DATA.is_present(&r));
    assert!(!ICON_MODEL_DATA.remove_from(&mut r));
    assert_eq!(r["icon"]["value"], "skin-hash");
  }

  #[test]
  fn kind_names_roundtrip() {
    for kind in CollectionKind::ALL {
      assert_eq!(CollectionKind::parse(kind.as_str()), Some(kind));
    }
    assert_eq!(CollectionKind::parse("nope"), None);
  }

  #[test]
  fn collection_ref_display() {
    assert_eq!(CollectionRef::global(CollectionKind::Item).to_string(), "item");
    assert_eq!(
      CollectionRef::scoped(CollectionKind::Aspect, "mage").to_string(),
      "aspect:mage"
    );
  }
}
