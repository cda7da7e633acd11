//! Presence types: per-guild online snapshots and the online-count series.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::snapshot::{EntityKey, Snapshot};

/// The derived annotation the presence pass sets on online roster members.
pub const LAST_SEEN_FIELD: &str = "lastSeen";

/// One guild's presence as computed against the shared online set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
  pub guild_key:  String,
  pub guild_name: Option<String>,
  /// Roster members that are currently online.
  pub online:     Vec<EntityKey>,
}

impl PresenceUpdate {
  /// Intersect a stored roster with the online set.
  pub fn compute(
    guild_key: impl Into<String>,
    guild_name: Option<String>,
    roster: &Snapshot,
    online_set: &HashSet<String>,
  ) -> Self {
    let online = roster
      .keys()
      .filter(|k| online_set.contains(k.as_str()))
      .cloned()
      .collect();
    Self { guild_key: guild_key.into(), guild_name, online }
  }

  pub fn count(&self) -> usize { self.online.len() }
}

/// One point of a guild's online-count time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineCount {
  pub guild_key:  String,
  pub guild_name: Option<String>,
  pub timestamp:  i64,
  pub count:      i64,
}

/// What a batch presence write touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceWrite {
  /// Roster rows whose `lastSeen` was set.
  pub members_touched: usize,
  /// Online-count rows appended.
  pub counts_appended: usize,
}
