//! Error type for `wynnsync-client`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Build(#[source] reqwest::Error),

  #[error("invalid URL {0:?}")]
  BadUrl(String),

  #[error("GET {url} failed: {source}")]
  Transport {
    url:    String,
    #[source]
    source: reqwest::Error,
  },

  #[error("GET {url} → {status}")]
  Status { url: String, status: u16 },

  /// HTTP 429; the client is now cooling down.
  #[error("GET {url} rate limited")]
  RateLimited { url: String, cooldown: Duration },

  #[error("GET {url}: could not decode body: {source}")]
  Decode {
    url:    String,
    #[source]
    source: reqwest::Error,
  },
}

impl From<Error> for wynnsync_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::RateLimited { cooldown, .. } => Self::RateLimited { cooldown },
      Error::Transport { ref url, .. }
      | Error::Status { ref url, .. }
      | Error::Decode { ref url, .. } => Self::fetch(url.clone(), &e),
      Error::Build(_) | Error::BadUrl(_) => Self::fetch("client", &e),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
