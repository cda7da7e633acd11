//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Records are stored as compact JSON objects. Timestamps are integer
//! seconds since the epoch.

use serde_json::Value;
use wynnsync_core::{
  changelog::{ChangeEvent, ChangeStatus},
  presence::OnlineCount,
  snapshot::{CurrentState, EntityKey, Record},
};

use crate::{Error, Result};

// ─── Record ──────────────────────────────────────────────────────────────────

pub fn encode_record(r: &Record) -> Result<String> { Ok(serde_json::to_string(r)?) }

pub fn decode_record(key: &str, s: &str) -> Result<Record> {
  match serde_json::from_str(s)? {
    Value::Object(map) => Ok(map),
    other => Err(Error::CorruptRow {
      key:    key.to_owned(),
      reason: format!("expected a JSON object, found {other}"),
    }),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `current_state` row.
pub struct RawCurrentState {
  pub entity_key:   String,
  pub record_json:  String,
  pub derived_json: String,
  pub updated_at:   i64,
}

impl RawCurrentState {
  pub fn into_current(self) -> Result<CurrentState> {
    let record = decode_record(&self.entity_key, &self.record_json)?;
    let derived = decode_record(&self.entity_key, &self.derived_json)?;
    Ok(CurrentState {
      key: EntityKey::new(self.entity_key),
      record,
      derived,
      updated_at: self.updated_at,
    })
  }
}

/// Raw strings read directly from a `changelog` row.
pub struct RawChangeEvent {
  pub timestamp:    i64,
  pub entity_key:   String,
  pub status:       String,
  pub payload_json: String,
}

impl RawChangeEvent {
  pub fn into_event(self) -> Result<ChangeEvent> {
    let status = ChangeStatus::parse(&self.status)
      .ok_or_else(|| Error::UnknownStatus(self.status.clone()))?;
    Ok(ChangeEvent {
      timestamp: self.timestamp,
      entity_key: EntityKey::new(self.entity_key),
      status,
      payload: serde_json::from_str(&self.payload_json)?,
    })
  }
}

/// An `online_counts` row; all columns are already native types.
pub fn online_count_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OnlineCount> {
  Ok(OnlineCount {
    guild_key:  row.get(0)?,
    guild_name: row.get(1)?,
    timestamp:  row.get(2)?,
    count:      row.get(3)?,
  })
}
