//! Canonicalizer: raw upstream payloads → keyed [`Snapshot`]s.
//!
//! Canonicalization never mutates the payload it reads; each snapshot is
//! built fresh from an immutable borrow of the source.

use std::{borrow::Cow, collections::HashSet};

use serde_json::Value;

use crate::{
  Error, Result,
  collection::{CollectionKind, FieldPath},
  snapshot::{EntityKey, Record, Snapshot},
};

/// Roster bucket that holds the member count rather than members.
const TOTAL_BUCKET: &str = "total";

/// Convert a raw payload for one collection into a [`Snapshot`].
pub fn canonicalize(raw: &Value, kind: CollectionKind) -> Result<Snapshot> {
  let top = as_object(raw, "payload")?;
  match kind {
    CollectionKind::GuildMember => roster(top),
    CollectionKind::Guild => guild_header(top),
    CollectionKind::Item | CollectionKind::Aspect => catalog(top),
    CollectionKind::Player => keyed_by_uuid(top.clone(), "player"),
  }
}

/// Flatten `members: { rank: { uuid: {..} } }` into `uuid -> {.., rank}`.
fn roster(top: &Record) -> Result<Snapshot> {
  let mut snapshot = Snapshot::new();
  let Some(members) = top.get("members") else {
    return Ok(snapshot);
  };
  let buckets = as_object(members, "members")?;

  for (rank, bucket) in buckets {
    if rank == TOTAL_BUCKET {
      continue;
    }
    let entries = as_object(bucket, rank)?;
    for (uuid, member) in entries {
      let mut record = as_object(member, uuid)?.clone();
      record.insert("rank".to_owned(), Value::String(rank.clone()));
      snapshot.insert(uuid.as_str(), record);
    }
  }

  Ok(snapshot)
}

fn guild_header(top: &Record) -> Result<Snapshot> {
  let mut header = top.clone();
  header.remove("members");
  keyed_by_uuid(header, "guild")
}

fn catalog(top: &Record) -> Result<Snapshot> {
  top
    .iter()
    .map(|(key, entry)| -> Result<(EntityKey, Record)> {
      Ok((EntityKey::from(key.as_str()), as_object(entry, key)?.clone()))
    })
    .collect()
}

fn keyed_by_uuid(record: Record, what: &str) -> Result<Snapshot> {
  let key = match record.get("uuid").and_then(Value::as_str) {
    Some(uuid) => EntityKey::from(uuid),
    None => {
      return Err(Error::malformed(format!("{what} payload has no `uuid`")));
    }
  };
  let mut snapshot = Snapshot::new();
  snapshot.insert(key, record);
  Ok(snapshot)
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Record> {
  value.as_object().ok_or_else(|| {
    Error::malformed(format!(
      "expected `{what}` to be a mapping, found {}",
      kind_name(value)
    ))
  })
}

fn kind_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "a sequence",
    Value::Object(_) => "a mapping",
  }
}

// ─── Noise suppression ───────────────────────────────────────────────────────

/// The comparison copy of `record` with every `noise` path removed. Borrows
/// when none of the paths is present.
pub fn strip_noise<'a>(
  record: &'a Record,
  noise: &[FieldPath],
) -> Cow<'a, Record> {
  if !noise.iter().any(|p| p.is_present(record)) {
    return Cow::Borrowed(record);
  }
  let mut copy = record.clone();
  for path in noise {
    path.remove_from(&mut copy);
  }
  Cow::Owned(copy)
}

/// Deep equality of two records, ignoring `noise` paths.
pub fn equivalent(a: &Record, b: &Record, noise: &[FieldPath]) -> bool {
  strip_noise(a, noise) == strip_noise(b, noise)
}

// ─── Auxiliary payloads ──────────────────────────────────────────────────────

/// The set of currently online player UUIDs from
/// `{ "total": n, "players": { uuid: server } }`.
pub fn online_players(raw: &Value) -> Result<HashSet<String>> {
  Ok(online_player_keys(raw)?.into_iter().collect())
}

/// Guild names from the guild list `{ name: { uuid, prefix } }`.
pub fn guild_names(raw: &Value) -> Result<Vec<String>> {
  Ok(as_object(raw, "payload")?.keys().cloned().collect())
}

/// The online player UUIDs as an ordered list, for per-player passes.
pub fn online_player_keys(raw: &Value) -> Result<Vec<String>> {
  let top = as_object(raw, "payload")?;
  match top.get("players") {
    Some(p) => Ok(as_object(p, "players")?.keys().cloned().collect()),
    None => Err(Error::malformed("online list has no `players`")),
  }
}

/// The name of the guild a player record belongs to, if any.
pub fn player_guild(record: &Record) -> Option<&str> {
  record
    .get("guild")
    .and_then(Value::as_object)
    .and_then(|g| g.get("name"))
    .and_then(Value::as_str)
}

/// The display name stored on a guild header record.
pub fn guild_name(record: &Record) -> Option<&str> {
  record.get("name").and_then(Value::as_str)
}
