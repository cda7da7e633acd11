//! Change events: the immutable, timestamped changelog entries.
//!
//! Every event from one run carries the same integer timestamp, so a run's
//! events can be grouped by exact timestamp equality. Events are never
//! updated or deleted once written.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{diff::Change, snapshot::EntityKey};

/// The classification of a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
  Add,
  Remove,
  Modify,
}

impl ChangeStatus {
  /// The string stored in the `status` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Add => "add",
      Self::Remove => "remove",
      Self::Modify => "modify",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "add" => Some(Self::Add),
      "remove" => Some(Self::Remove),
      "modify" => Some(Self::Modify),
      _ => None,
    }
  }
}

impl fmt::Display for ChangeStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A persisted changelog entry.
///
/// `payload` is the new record for `add`, the last-known record for `remove`,
/// and `{ "before": .., "after": .. }` for `modify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
  /// Seconds since the epoch, shared by every event of one run.
  pub timestamp:  i64,
  pub entity_key: EntityKey,
  pub status:     ChangeStatus,
  pub payload:    Value,
}

impl Change {
  /// Materialise this change as a changelog entry stamped with the run
  /// timestamp.
  pub fn stamp(self, timestamp: i64) -> ChangeEvent {
    let status = self.status();
    let (entity_key, payload) = match self {
      Change::Add { key, record } | Change::Remove { key, record } => {
        (key, Value::Object(record))
      }
      Change::Modify { key, before, after } => {
        (key, json!({ "before": before, "after": after }))
      }
    };
    ChangeEvent { timestamp, entity_key, status, payload }
  }
}

/// Stamp every change with the same run timestamp, preserving order.
pub fn stamp_all(changes: Vec<Change>, timestamp: i64) -> Vec<ChangeEvent> {
  changes.into_iter().map(|c| c.stamp(timestamp)).collect()
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn record(v: Value) -> crate::snapshot::Record {
    v.as_object().unwrap().clone()
  }

  #[test]
  fn modify_payload_has_before_and_after() {
    let change = Change::Modify {
      key:    "u1".into(),
      before: record(json!({ "rank": "recruit" })),
      after:  record(json!({ "rank": "officer" })),
    };
    let event = change.stamp(1_700_000_000);
    assert_eq!(event.status, ChangeStatus::Modify);
    assert_eq!(event.payload["before"]["rank"], "recruit");
    assert_eq!(event.payload["after"]["rank"], "officer");
  }

  #[test]
  fn run_shares_one_timestamp() {
    let changes = vec![
      Change::Add { key: "a".into(), record: record(json!({})) },
      Change::Remove { key: "b".into(), record: record(json!({ "x": 1 })) },
    ];
    let events = stamp_all(changes, 42);
    assert!(events.iter().all(|e| e.timestamp == 42));
    assert_eq!(events[1].payload, json!({ "x": 1 }));
  }

  #[test]
  fn status_strings() {
    for s in [ChangeStatus::Add, ChangeStatus::Remove, ChangeStatus::Modify] {
      assert_eq!(ChangeStatus::parse(s.as_str()), Some(s));
    }
  }
}
