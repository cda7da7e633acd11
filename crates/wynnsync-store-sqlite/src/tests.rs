//! Integration tests for `SqliteStore` against an in-memory database.

use serde_json::{Value, json};
use wynnsync_core::{
  changelog::{ChangeStatus, ChangeEvent},
  collection::{CollectionKind, CollectionRef},
  presence::{LAST_SEEN_FIELD, PresenceUpdate},
  snapshot::{EntityKey, Record, Snapshot},
  store::SnapshotStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn record(v: Value) -> Record {
  v.as_object().expect("object").clone()
}

fn items() -> CollectionRef { CollectionRef::global(CollectionKind::Item) }

fn roster(guild: &str) -> CollectionRef {
  CollectionRef::scoped(CollectionKind::GuildMember, guild)
}

// ─── Current state ───────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_twice_leaves_one_row_equal_to_second() {
  let s = store().await;
  let key = EntityKey::from("X");

  s.upsert(&items(), &key, &record(json!({ "tier": "rare", "stale": true })))
    .await
    .unwrap();
  s.upsert(&items(), &key, &record(json!({ "tier": "mythic" })))
    .await
    .unwrap();

  let previous = s.load_previous(&items()).await.unwrap();
  assert_eq!(previous.len(), 1);
  // Whole-document replace: the stale field is gone.
  assert_eq!(previous.get("X").unwrap(), &record(json!({ "tier": "mythic" })));
}

#[tokio::test]
async fn load_one_missing_returns_none() {
  let s = store().await;
  let got = s.load_one(&items(), &EntityKey::from("nope")).await.unwrap();
  assert!(got.is_none());
}

#[tokio::test]
async fn load_previous_keeps_insertion_order() {
  let s = store().await;
  let mut snap = Snapshot::new();
  for key in ["zeta", "alpha", "mu"] {
    snap.insert(key, record(json!({ "name": key })));
  }
  assert_eq!(s.upsert_all(&items(), &snap).await.unwrap(), 3);

  let loaded = s.load_previous(&items()).await.unwrap();
  let keys: Vec<&str> = loaded.keys().map(EntityKey::as_str).collect();
  assert_eq!(keys, ["zeta", "alpha", "mu"]);
  assert_eq!(loaded, snap);
}

#[tokio::test]
async fn scopes_are_isolated() {
  let s = store().await;
  let mut a = Snapshot::new();
  a.insert("u1", record(json!({ "rank": "owner" })));
  let mut b = Snapshot::new();
  b.insert("u2", record(json!({ "rank": "recruit" })));

  s.upsert_all(&roster("g1"), &a).await.unwrap();
  s.upsert_all(&roster("g2"), &b).await.unwrap();

  assert_eq!(s.load_previous(&roster("g1")).await.unwrap(), a);
  assert_eq!(s.load_previous(&roster("g2")).await.unwrap(), b);
  assert_eq!(
    s.list_scopes(CollectionKind::GuildMember).await.unwrap(),
    vec!["g1".to_owned(), "g2".to_owned()]
  );
  assert!(s.list_scopes(CollectionKind::Item).await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_keys_drops_rows() {
  let s = store().await;
  let mut snap = Snapshot::new();
  snap.insert("u1", record(json!({})));
  snap.insert("u2", record(json!({})));
  s.upsert_all(&roster("g1"), &snap).await.unwrap();

  let removed = s
    .remove_keys(&roster("g1"), &[EntityKey::from("u2"), EntityKey::from("ghost")])
    .await
    .unwrap();
  assert_eq!(removed, 1);

  let left = s.load_previous(&roster("g1")).await.unwrap();
  assert_eq!(left.len(), 1);
  assert!(left.contains_key("u1"));
}

// ─── Presence / derived annotations ──────────────────────────────────────────

#[tokio::test]
async fn last_seen_survives_roster_upsert() {
  let s = store().await;
  let key = EntityKey::from("u1");
  s.upsert(&roster("g1"), &key, &record(json!({ "rank": "recruit" })))
    .await
    .unwrap();

  let update = PresenceUpdate {
    guild_key:  "g1".into(),
    guild_name: Some("Guild".into()),
    online:     vec![key.clone()],
  };
  let write = s.record_presence(&[update], 1_000).await.unwrap();
  assert_eq!(write.members_touched, 1);
  assert_eq!(write.counts_appended, 1);

  s.upsert(&roster("g1"), &key, &record(json!({ "rank": "officer" })))
    .await
    .unwrap();

  let row = s.load_one(&roster("g1"), &key).await.unwrap().unwrap();
  assert_eq!(row.record["rank"], "officer");
  assert_eq!(row.derived[LAST_SEEN_FIELD], 1_000);

  // Derived annotations never leak into the comparison snapshot.
  let previous = s.load_previous(&roster("g1")).await.unwrap();
  assert!(!previous.get("u1").unwrap().contains_key(LAST_SEEN_FIELD));
}

#[tokio::test]
async fn presence_ignores_unknown_members() {
  let s = store().await;
  let update = PresenceUpdate {
    guild_key:  "g1".into(),
    guild_name: None,
    online:     vec![EntityKey::from("never-synced")],
  };
  let write = s.record_presence(&[update], 5).await.unwrap();
  assert_eq!(write.members_touched, 0);
  assert_eq!(write.counts_appended, 1);

  let counts = s.online_counts("g1").await.unwrap();
  assert_eq!(counts.len(), 1);
  assert_eq!(counts[0].count, 1);
  assert_eq!(counts[0].timestamp, 5);
}

#[tokio::test]
async fn prune_removes_only_old_counts() {
  let s = store().await;
  for ts in [100, 200, 300] {
    let update = PresenceUpdate {
      guild_key:  "g1".into(),
      guild_name: None,
      online:     vec![],
    };
    s.record_presence(&[update], ts).await.unwrap();
  }

  assert_eq!(s.prune_online_counts(250).await.unwrap(), 2);
  let left = s.online_counts("g1").await.unwrap();
  assert_eq!(left.len(), 1);
  assert_eq!(left[0].timestamp, 300);
}

// ─── Changelog ───────────────────────────────────────────────────────────────

fn event(ts: i64, key: &str, status: ChangeStatus) -> ChangeEvent {
  ChangeEvent {
    timestamp:  ts,
    entity_key: key.into(),
    status,
    payload:    json!({ "key": key }),
  }
}

#[tokio::test]
async fn changelog_appends_and_reads_back_in_order() {
  let s = store().await;
  let first = [event(10, "a", ChangeStatus::Add), event(10, "b", ChangeStatus::Remove)];
  let second = [event(20, "a", ChangeStatus::Modify)];

  assert_eq!(s.append_changelog(&items(), &first).await.unwrap(), 2);
  assert_eq!(s.append_changelog(&items(), &second).await.unwrap(), 1);

  let all = s.changelog(&items(), None).await.unwrap();
  assert_eq!(all.len(), 3);
  assert_eq!(all[0], first[0]);
  assert_eq!(all[2].status, ChangeStatus::Modify);

  let recent = s.changelog(&items(), Some(15)).await.unwrap();
  assert_eq!(recent, second.to_vec());
}

#[tokio::test]
async fn empty_changelog_batch_writes_nothing() {
  let s = store().await;
  assert_eq!(s.append_changelog(&items(), &[]).await.unwrap(), 0);
  assert!(s.changelog(&items(), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn changelog_is_scoped() {
  let s = store().await;
  s.append_changelog(&roster("g1"), &[event(1, "u1", ChangeStatus::Add)])
    .await
    .unwrap();
  assert!(s.changelog(&roster("g2"), None).await.unwrap().is_empty());
  assert_eq!(s.changelog(&roster("g1"), None).await.unwrap().len(), 1);
}
