//! Runtime configuration, deserialised from `wynnsync.toml` and
//! `WYNNSYNC_*` environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;
use wynnsync_client::ClientConfig;

const THREE_DAYS_SECS: i64 = 3 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  pub api_base_url:                String,
  pub store_path:                  PathBuf,
  pub http_timeout_secs:           u64,
  pub request_interval_ms:         u64,
  pub rate_limit_cooldown_secs:    u64,
  /// Player classes whose aspect catalogs are tracked.
  pub aspect_classes:              Vec<String>,
  /// Upper bound on concurrent presence tasks.
  pub presence_concurrency:        usize,
  /// Online-count rows older than this are pruned after each presence pass.
  pub online_count_retention_secs: i64,
  /// Cap on players fetched per `players` pass; `None` means all online.
  pub max_players:                 Option<usize>,
}

impl Default for SyncConfig {
  fn default() -> Self {
    let client = ClientConfig::default();
    Self {
      api_base_url:                client.base_url,
      store_path:                  PathBuf::from("wynnsync.db"),
      http_timeout_secs:           client.timeout.as_secs(),
      request_interval_ms:         client.request_interval.as_millis() as u64,
      rate_limit_cooldown_secs:    client.rate_limit_cooldown.as_secs(),
      aspect_classes:              ["mage", "archer", "shaman", "warrior", "assassin"]
        .into_iter()
        .map(String::from)
        .collect(),
      presence_concurrency:        16,
      online_count_retention_secs: THREE_DAYS_SECS,
      max_players:                 None,
    }
  }
}

impl SyncConfig {
  /// Layer an optional TOML file under `WYNNSYNC_*` environment variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("WYNNSYNC")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("aspect_classes"),
      )
      .build()?
      .try_deserialize()
  }

  pub fn client_config(&self) -> ClientConfig {
    ClientConfig {
      base_url:            self.api_base_url.clone(),
      timeout:             Duration::from_secs(self.http_timeout_secs),
      request_interval:    Duration::from_millis(self.request_interval_ms),
      rate_limit_cooldown: Duration::from_secs(self.rate_limit_cooldown_secs),
    }
  }
}
