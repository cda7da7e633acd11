//! The `Upstream` trait: where raw game-data payloads come from.
//!
//! HTTP status handling, pacing, and rate-limit cooldowns are the
//! implementation's responsibility. The core only needs "payload or failure".

use std::future::Future;

use serde_json::Value;

use crate::Result;

/// Source of raw JSON payloads for each tracked collection.
///
/// Failures are reported as [`Error::Fetch`](crate::Error::Fetch) or
/// [`Error::RateLimited`](crate::Error::RateLimited).
pub trait Upstream: Send + Sync {
  /// `{ guild_name: { uuid, prefix } }` for every guild.
  fn guild_list(&self) -> impl Future<Output = Result<Value>> + Send + '_;

  /// One guild, with its rank-bucketed roster keyed by member UUID.
  fn guild<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Value>> + Send + 'a;

  /// The full item catalog, keyed by item name.
  fn item_catalog(&self) -> impl Future<Output = Result<Value>> + Send + '_;

  /// The aspect catalog for one player class, keyed by aspect id.
  fn aspect_catalog<'a>(
    &'a self,
    class: &'a str,
  ) -> impl Future<Output = Result<Value>> + Send + 'a;

  /// `{ total, players: { uuid: server } }` for every online player.
  fn online_players(&self) -> impl Future<Output = Result<Value>> + Send + '_;

  /// One player record. `None` when the upstream does not know the player.
  fn player<'a>(
    &'a self,
    uuid: &'a str,
  ) -> impl Future<Output = Result<Option<Value>>> + Send + 'a;
}
