//! Error types for `wynnsync-core`.
//!
//! Every failure the sync pipeline can hit maps onto one of these variants.
//! The orchestrator catches them at the collection boundary; none of them
//! crosses into a sibling collection.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Network failure or non-2xx response from the upstream API.
  #[error("fetch failed for {target}: {reason}")]
  Fetch { target: String, reason: String },

  /// The upstream asked us to back off; no further calls until `cooldown`
  /// has elapsed.
  #[error("rate limited by upstream, cooling down for {}s", cooldown.as_secs())]
  RateLimited { cooldown: Duration },

  #[error("malformed payload: {0}")]
  MalformedPayload(String),

  #[error("store read failed: {0}")]
  StoreRead(String),

  /// Partial or total failure persisting upserts or changelog rows.
  #[error("store write failed: {0}")]
  StoreWrite(String),
}

impl Error {
  pub fn malformed(msg: impl Into<String>) -> Self {
    Self::MalformedPayload(msg.into())
  }

  pub fn fetch(target: impl Into<String>, reason: impl ToString) -> Self {
    Self::Fetch { target: target.into(), reason: reason.to_string() }
  }

  pub fn store_read(e: impl std::error::Error) -> Self {
    Self::StoreRead(e.to_string())
  }

  pub fn store_write(e: impl std::error::Error) -> Self {
    Self::StoreWrite(e.to_string())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
