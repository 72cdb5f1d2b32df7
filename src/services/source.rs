// src/services/source.rs

//! Upstream platform client.
//!
//! Discovers online channels, lists their clips and enriches each clip
//! with a game title, playable url, share link and hype zone id. Every
//! request goes through [`SourceClient::request`], which owns the rate
//! limit backoff.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Channel, Clip, SourceConfig, parse_hype_zone};
use crate::utils::http::{RetryPolicy, create_async_client};
use crate::utils::{avatar_url, parse_base_url, resolve_url, share_url};

/// Title used when a game name cannot be resolved.
pub const UNKNOWN_GAME: &str = "Unknown";

/// Channels per listing page.
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct GameType {
    name: String,
}

/// Client for the upstream clip platform.
pub struct SourceClient {
    client: Client,
    base_url: Url,
    web_base_url: String,
    retry: RetryPolicy,
    page_delay: Duration,
    max_pages: u32,
    game_cache_capacity: usize,
    game_names: RwLock<HashMap<u64, String>>,
}

impl SourceClient {
    /// Create a new source client with the given configuration.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            base_url: parse_base_url(&config.api_base_url)?,
            web_base_url: config.web_base_url.clone(),
            retry: RetryPolicy::from_config(config),
            page_delay: Duration::from_millis(config.page_delay_ms),
            max_pages: config.max_pages,
            game_cache_capacity: config.game_cache_capacity,
            game_names: RwLock::new(HashMap::new()),
        })
    }

    /// Discover online channels with at least `min_viewers` viewers,
    /// optionally restricted to one language tag.
    ///
    /// Pages through the listing (online first, most viewers first) until a
    /// page is empty, starts below the viewer floor, starts with an offline
    /// channel, or the page cap is hit. A failing first page is an error; a
    /// later failing page ends discovery with whatever was gathered before it.
    pub async fn discover_online_channels(
        &self,
        min_viewers: u64,
        language: Option<&str>,
    ) -> Result<Vec<Channel>> {
        let mut gathered = Vec::new();

        for page in 0..self.max_pages {
            let path = format!(
                "api/v1/channels?limit={PAGE_SIZE}&page={page}&order=online:desc,viewersCurrent:desc&fields=token,id,viewersCurrent,online,userId,languageId,partnered"
            );

            let channels: Vec<Channel> = match self.get_json(&path).await {
                Ok(channels) => channels,
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    log::error!("Failed to query channel listing page {}: {}", page, e);
                    break;
                }
            };

            let stop = match channels.first() {
                None => true,
                Some(first) => first.viewers_current < min_viewers || !first.online,
            };
            gathered.extend(channels);

            if stop {
                break;
            }

            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        let online: Vec<Channel> = gathered
            .into_iter()
            .filter(|c| c.online)
            .map(|mut c| {
                c.normalize_language();
                c.avatar_url = avatar_url(&self.base_url, c.user_id);
                c
            })
            .filter(|c| match language {
                Some(lang) if !lang.trim().is_empty() => c.language.eq_ignore_ascii_case(lang),
                _ => true,
            })
            .collect();

        log::debug!("Discovered {} online channels", online.len());
        Ok(online)
    }

    /// Fetch and enrich every clip of a channel.
    pub async fn fetch_clips(&self, channel: &Channel) -> Result<Vec<Clip>> {
        let path = format!("api/v1/clips/channels/{}", channel.id);
        let clips: Vec<Clip> = self.get_json(&path).await?;

        let mut enriched = Vec::with_capacity(clips.len());
        for mut clip in clips {
            clip.game_title = self.game_name(clip.type_id).await;
            if let Some(uri) = clip.hls_locator().map(str::to_string) {
                clip.clip_url = uri;
            }
            clip.shareable_url = share_url(&self.web_base_url, channel.id, &clip.shareable_id);
            clip.hype_zone_channel_id = parse_hype_zone(&clip.tags);
            clip.channel = channel.clone();
            enriched.push(clip);
        }

        Ok(enriched)
    }

    /// Resolve a game/type id to its title, caching successful lookups.
    pub async fn game_name(&self, type_id: u64) -> String {
        if let Some(name) = self.cached_game_name(type_id) {
            return name;
        }

        match self
            .get_json::<GameType>(&format!("api/v1/types/{type_id}"))
            .await
        {
            Ok(game) => {
                self.cache_game_name(type_id, &game.name);
                game.name
            }
            Err(e) => {
                log::warn!("Failed to get game name for {}: {}", type_id, e);
                UNKNOWN_GAME.to_string()
            }
        }
    }

    /// Look up a channel id by its name. `None` when the channel does not exist.
    pub async fn channel_id(&self, name: &str) -> Result<Option<u64>> {
        let path = format!("api/v1/channels/{}", name.trim());
        match self.get_json::<Channel>(&path).await {
            Ok(channel) => Ok(Some(channel.id)),
            Err(AppError::Upstream { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Number of cached game names.
    pub fn cached_games(&self) -> usize {
        self.game_names.read().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Perform a GET request, backing off on 429 responses.
    ///
    /// Each call starts a fresh [`Backoff`](crate::utils::http::Backoff);
    /// any other non-success status fails immediately.
    pub async fn request(&self, path: &str) -> Result<String> {
        let url = resolve_url(&self.base_url, path);
        let mut backoff = self.retry.backoff();

        loop {
            let response = self.client.get(&url).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let Some(delay) = backoff.next_delay() else {
                    return Err(AppError::RateLimited {
                        url,
                        attempts: backoff.attempts(),
                    });
                };
                log::info!(
                    "[Request Throttled] backing off for {}ms, URL: {}",
                    delay.as_millis(),
                    url
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                return Err(AppError::Upstream {
                    status: status.as_u16(),
                    url,
                });
            }

            return Ok(response.text().await?);
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.request(path).await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn cached_game_name(&self, type_id: u64) -> Option<String> {
        self.game_names
            .read()
            .ok()
            .and_then(|cache| cache.get(&type_id).cloned())
    }

    fn cache_game_name(&self, type_id: u64, name: &str) {
        if let Ok(mut cache) = self.game_names.write() {
            if cache.len() < self.game_cache_capacity || cache.contains_key(&type_id) {
                cache.insert(type_id, name.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> SourceConfig {
        SourceConfig {
            api_base_url: server.uri(),
            web_base_url: "https://watch.example".into(),
            page_delay_ms: 0,
            base_delay_ms: 1,
            max_attempts: 3,
            ..SourceConfig::default()
        }
    }

    fn channel_json(id: u64, viewers: u64, online: bool) -> serde_json::Value {
        json!({
            "id": id,
            "token": format!("channel{id}"),
            "viewersCurrent": viewers,
            "online": online,
            "partnered": false,
            "languageId": if id % 2 == 0 { json!("en") } else { json!(null) },
            "userId": id * 10
        })
    }

    fn clip_json(id: &str, type_id: u64, tags: serde_json::Value) -> serde_json::Value {
        json!({
            "contentId": id,
            "title": format!("clip {id}"),
            "viewCount": 10,
            "typeId": type_id,
            "uploadDate": "2024-05-01T10:00:00Z",
            "expirationDate": "2099-05-01T10:00:00Z",
            "durationInSeconds": 20,
            "contentMaturity": 0,
            "contentLocators": [
                {"locatorType": "Thumbnail", "uri": "https://cdn/t.jpg"},
                {"locatorType": "HlsStreaming", "uri": format!("https://cdn/{id}.m3u8")}
            ],
            "tags": tags,
            "shareableId": format!("share-{id}")
        })
    }

    #[tokio::test]
    async fn test_discovery_stops_below_viewer_floor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/channels"))
            .and(query_param("page", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                channel_json(1, 900, true),
                channel_json(2, 400, true)
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/channels"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                channel_json(3, 1, true),
                channel_json(4, 0, false)
            ])))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let channels = client.discover_online_channels(2, None).await.unwrap();

        // page 1 is kept but ends paging; offline channels are dropped
        let ids: Vec<u64> = channels.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(channels[0].language, "unknown");
        assert_eq!(channels[1].language, "en");
        assert!(channels[0].avatar_url.ends_with("/api/v1/users/10/avatar"));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_discovery_stops_on_empty_page_and_page_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/channels"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([channel_json(2, 900, true)])),
            )
            .mount(&server)
            .await;

        let config = SourceConfig {
            max_pages: 3,
            ..config_for(&server)
        };
        let client = SourceClient::new(&config).unwrap();
        let channels = client.discover_online_channels(2, None).await.unwrap();
        assert_eq!(channels.len(), 3);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);

        let empty = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&empty)
            .await;
        let client = SourceClient::new(&config_for(&empty)).unwrap();
        assert!(client.discover_online_channels(2, None).await.unwrap().is_empty());
        assert_eq!(empty.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_discovery_language_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/channels"))
            .and(query_param("page", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                channel_json(2, 900, true),
                channel_json(3, 800, true),
                channel_json(5, 0, false)
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let channels = client
            .discover_online_channels(2, Some("EN"))
            .await
            .unwrap();
        let ids: Vec<u64> = channels.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_discovery_page_failures() {
        let down = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&down)
            .await;
        let client = SourceClient::new(&config_for(&down)).unwrap();
        let err = client.discover_online_channels(2, None).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 503, .. }));

        let flaky = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/channels"))
            .and(query_param("page", "0"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([channel_json(2, 900, true)])),
            )
            .mount(&flaky)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/channels"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&flaky)
            .await;
        let client = SourceClient::new(&config_for(&flaky)).unwrap();
        let channels = client.discover_online_channels(2, None).await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(flaky.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_clips_enriches_and_caches_game_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/clips/channels/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                clip_json("a", 7, json!(["HZ-1234", "other"])),
                clip_json("b", 7, json!(["HZ-abc"])),
                clip_json("c", 8, json!(null))
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/types/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "Rocket Golf"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/types/8"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let channel = Channel {
            id: 42,
            name: "host".into(),
            online: true,
            ..Channel::default()
        };
        let clips = client.fetch_clips(&channel).await.unwrap();

        assert_eq!(clips.len(), 3);
        assert_eq!(clips[0].game_title, "Rocket Golf");
        assert_eq!(clips[1].game_title, "Rocket Golf");
        assert_eq!(clips[2].game_title, UNKNOWN_GAME);
        assert_eq!(clips[0].clip_url, "https://cdn/a.m3u8");
        assert_eq!(clips[0].shareable_url, "https://watch.example/42?clip=share-a");
        assert_eq!(clips[0].hype_zone_channel_id, 1234);
        assert_eq!(clips[1].hype_zone_channel_id, 0);
        assert_eq!(clips[2].hype_zone_channel_id, 0);
        assert!(clips.iter().all(|c| c.channel.id == 42 && c.channel.online));
        assert_eq!(client.cached_games(), 1);
    }

    #[tokio::test]
    async fn test_game_cache_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/types/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "One"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/types/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Two"})))
            .mount(&server)
            .await;

        let config = SourceConfig {
            game_cache_capacity: 1,
            ..config_for(&server)
        };
        let client = SourceClient::new(&config).unwrap();
        assert_eq!(client.game_name(1).await, "One");
        assert_eq!(client.game_name(2).await, "Two");
        assert_eq!(client.cached_games(), 1);
    }

    #[tokio::test]
    async fn test_request_retries_rate_limited_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/types/3"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/types/3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"name\":\"Three\"}"))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let body = client.request("api/v1/types/3").await.unwrap();
        assert!(body.contains("Three"));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_request_gives_up_after_retry_ceiling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let err = client.request("api/v1/types/3").await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited { attempts: 3, .. }));
        // initial request plus one retry per tolerated 429
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_request_fails_fast_on_other_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        let err = client.request("api/v1/clips/channels/1").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 503, .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_channel_id_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/channels/someone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(channel_json(99, 5, true)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/channels/nobody"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = SourceClient::new(&config_for(&server)).unwrap();
        assert_eq!(client.channel_id("someone").await.unwrap(), Some(99));
        assert_eq!(client.channel_id("nobody").await.unwrap(), None);
    }
}
