//! [`ApiClient`]: the `reqwest` implementation of [`Upstream`].

use std::{sync::Arc, time::Duration};

use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use wynnsync_core::upstream::Upstream;

use crate::{Error, Result, pacer::Pacer};

/// Connection settings for the game-data API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url:            String,
  pub timeout:             Duration,
  /// Minimum spacing between consecutive requests.
  pub request_interval:    Duration,
  /// Fixed pause after a 429 before any further request.
  pub rate_limit_cooldown: Duration,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url:            "https://api.wynncraft.com/v3".into(),
      timeout:             Duration::from_secs(30),
      request_interval:    Duration::from_millis(200),
      rate_limit_cooldown: Duration::from_secs(60),
    }
  }
}

/// Async HTTP client for one upstream API.
///
/// Cheap to clone: the inner [`reqwest::Client`] and the pacer are shared,
/// so every clone observes the same cooldown window.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  base:   Url,
  pacer:  Arc<Pacer>,
}

impl ApiClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(Error::Build)?;
    let base = Url::parse(&config.base_url)
      .map_err(|_| Error::BadUrl(config.base_url.clone()))?;
    if base.cannot_be_a_base() {
      return Err(Error::BadUrl(config.base_url));
    }
    let pacer = Arc::new(Pacer::new(
      config.request_interval,
      config.rate_limit_cooldown,
    ));
    Ok(Self { client, base, pacer })
  }

  /// `base` + path `segments` (each percent-encoded) + optional raw query.
  fn url(&self, segments: &[&str], query: Option<&str>) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url.set_query(query);
    url
  }

  /// GET `url` and decode the JSON body. `Ok(None)` on 404.
  async fn get_json(&self, url: Url) -> Result<Option<Value>> {
    self.pacer.acquire().await;
    tracing::debug!(%url, "GET");

    let resp = self
      .client
      .get(url.clone())
      .send()
      .await
      .map_err(|source| Error::Transport { url: url.to_string(), source })?;

    match resp.status() {
      StatusCode::NOT_FOUND => return Ok(None),
      StatusCode::TOO_MANY_REQUESTS => {
        self.pacer.back_off().await;
        let cooldown = self.pacer.cooldown();
        tracing::warn!(%url, cooldown_secs = cooldown.as_secs(), "rate limited");
        return Err(Error::RateLimited { url: url.to_string(), cooldown });
      }
      status if !status.is_success() => {
        return Err(Error::Status {
          url:    url.to_string(),
          status: status.as_u16(),
        });
      }
      _ => {}
    }

    let body = resp
      .json()
      .await
      .map_err(|source| Error::Decode { url: url.to_string(), source })?;
    Ok(Some(body))
  }

  /// Like [`get_json`](Self::get_json), but a 404 is an error.
  async fn get_required(&self, url: Url) -> Result<Value> {
    match self.get_json(url.clone()).await? {
      Some(body) => Ok(body),
      None => Err(Error::Status { url: url.to_string(), status: 404 }),
    }
  }
}

// ─── Upstream impl ───────────────────────────────────────────────────────────

impl Upstream for ApiClient {
  /// `GET /guild/list/guild`
  async fn guild_list(&self) -> wynnsync_core::Result<Value> {
    let url = self.url(&["guild", "list", "guild"], None);
    Ok(self.get_required(url).await?)
  }

  /// `GET /guild/{name}?identifier=uuid`
  async fn guild(&self, name: &str) -> wynnsync_core::Result<Value> {
    let url = self.url(&["guild", name], Some("identifier=uuid"));
    Ok(self.get_required(url).await?)
  }

  /// `GET /item/database?fullResult`
  async fn item_catalog(&self) -> wynnsync_core::Result<Value> {
    let url = self.url(&["item", "database"], Some("fullResult"));
    Ok(self.get_required(url).await?)
  }

  /// `GET /aspects/{class}`
  async fn aspect_catalog(&self, class: &str) -> wynnsync_core::Result<Value> {
    let url = self.url(&["aspects", class], None);
    Ok(self.get_required(url).await?)
  }

  /// `GET /player?identifier=uuid`
  async fn online_players(&self) -> wynnsync_core::Result<Value> {
    let url = self.url(&["player"], Some("identifier=uuid"));
    Ok(self.get_required(url).await?)
  }

  /// `GET /player/{uuid}?fullResult`
  async fn player(&self, uuid: &str) -> wynnsync_core::Result<Option<Value>> {
    let url = self.url(&["player", uuid], Some("fullResult"));
    Ok(self.get_json(url).await?)
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tokio::time::Instant;
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
  };

  use super::*;

  async fn client_for(server: &MockServer, cooldown: Duration) -> ApiClient {
    ApiClient::new(ClientConfig {
      base_url:            format!("{}/v3", server.uri()),
      timeout:             Duration::from_secs(5),
      request_interval:    Duration::ZERO,
      rate_limit_cooldown: cooldown,
    })
    .unwrap()
  }

  #[tokio::test]
  async fn fetches_item_catalog() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/v3/item/database"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({ "Sword": { "tier": "rare" } })),
      )
      .mount(&server)
      .await;

    let client = client_for(&server, Duration::from_secs(1)).await;
    let body = client.item_catalog().await.unwrap();
    assert_eq!(body["Sword"]["tier"], "rare");
  }

  #[tokio::test]
  async fn guild_name_is_path_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/v3/guild/Some%20Guild"))
      .and(query_param("identifier", "uuid"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uuid": "g1" })))
      .mount(&server)
      .await;

    let client = client_for(&server, Duration::from_secs(1)).await;
    let body = client.guild("Some Guild").await.unwrap();
    assert_eq!(body["uuid"], "g1");
  }

  #[tokio::test]
  async fn unknown_player_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/v3/player/p404"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;

    let client = client_for(&server, Duration::from_secs(1)).await;
    assert!(client.player("p404").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn server_error_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/v3/aspects/mage"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;

    let client = client_for(&server, Duration::from_secs(1)).await;
    let err = client.aspect_catalog("mage").await.unwrap_err();
    assert!(matches!(err, wynnsync_core::Error::Fetch { .. }), "{err}");
  }

  #[tokio::test]
  async fn rate_limit_enforces_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/v3/player"))
      .respond_with(ResponseTemplate::new(429))
      .up_to_n_times(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/v3/player"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({ "total": 0, "players": {} })),
      )
      .mount(&server)
      .await;

    let cooldown = Duration::from_millis(300);
    let client = client_for(&server, cooldown).await;

    let err = client.online_players().await.unwrap_err();
    assert!(matches!(err, wynnsync_core::Error::RateLimited { .. }), "{err}");

    let start = Instant::now();
    client.online_players().await.unwrap();
    assert!(start.elapsed() >= cooldown - Duration::from_millis(20));
  }

  #[test]
  fn rejects_non_base_url() {
    let config = ClientConfig {
      base_url: "mailto:someone@example.com".into(),
      ..ClientConfig::default()
    };
    assert!(matches!(ApiClient::new(config), Err(Error::BadUrl(_))));
  }
}
