//! Error type for `wynnsync-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A stored JSON column did not hold a mapping.
  #[error("corrupt row {key:?}: {reason}")]
  CorruptRow { key: String, reason: String },

  #[error("unknown change status: {0:?}")]
  UnknownStatus(String),
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    Self::Database(tokio_rusqlite::Error::Rusqlite(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
