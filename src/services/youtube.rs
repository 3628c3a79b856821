// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! YouTube Data API v3 search provider.

use crate::models::search::{ResultSource, SearchResult};
use crate::services::provider::{
    build_http_client, decode, fetch_json_body, provider_timeout_from_env, ProviderError,
    TrackProvider,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
/// Music category
const MUSIC_CATEGORY_ID: &str = "10";
/// Maximum ids per `videos` lookup
const DETAILS_BATCH_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    #[serde(default)]
    url: String,
}

impl Thumbnails {
    /// Largest available thumbnail: high, then medium, then default
    fn best(&self) -> String {
        [&self.high, &self.medium, &self.default]
            .into_iter()
            .flatten()
            .map(|thumbnail| thumbnail.url.as_str())
            .find(|url| !url.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

pub struct YouTubeClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: build_http_client(timeout),
        }
    }

    /// Build from `YOUTUBE_API_KEY`; an unset key leaves the provider unconfigured
    pub fn from_env() -> Self {
        Self::new(
            env::var("YOUTUBE_API_KEY").unwrap_or_default(),
            provider_timeout_from_env(),
        )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<url::Url, ProviderError> {
        url::Url::parse_with_params(&format!("{}/{}", self.base_url, path), params)
            .map_err(|e| ProviderError::Other(format!("invalid YouTube URL: {}", e)))
    }

    /// Video durations in seconds, keyed by video id. Batches that fail are skipped.
    async fn video_durations(&self, video_ids: &[String]) -> HashMap<String, u32> {
        let mut durations = HashMap::new();

        for batch in video_ids.chunks(DETAILS_BATCH_SIZE) {
            let ids = batch.join(",");
            let url = match self.endpoint(
                "videos",
                &[
                    ("part", "contentDetails"),
                    ("id", ids.as_str()),
                    ("key", self.api_key.as_str()),
                ],
            ) {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "Skipping YouTube duration lookup");
                    continue;
                }
            };

            let body = match fetch_json_body(&self.http, ResultSource::Youtube, url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "YouTube duration lookup failed");
                    continue;
                }
            };

            match decode::<VideoListResponse>(ResultSource::Youtube, &body) {
                Ok(details) => {
                    for item in details.items {
                        durations.insert(
                            item.id,
                            parse_iso8601_duration(&item.content_details.duration),
                        );
                    }
                }
                Err(e) => warn!(error = %e, "YouTube duration lookup failed"),
            }
        }

        durations
    }
}

#[async_trait]
impl TrackProvider for YouTubeClient {
    fn source(&self) -> ResultSource {
        ResultSource::Youtube
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured(ResultSource::Youtube));
        }

        let max = max_results.to_string();
        let url = self.endpoint(
            "search",
            &[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("videoCategoryId", MUSIC_CATEGORY_ID),
                ("maxResults", max.as_str()),
                ("key", self.api_key.as_str()),
            ],
        )?;

        let body = fetch_json_body(&self.http, ResultSource::Youtube, url).await?;
        let response: SearchListResponse = decode(ResultSource::Youtube, &body)?;

        let video_ids: Vec<String> = response
            .items
            .iter()
            .filter_map(|item| item.id.video_id.clone())
            .filter(|id| !id.is_empty())
            .collect();
        let durations = self.video_durations(&video_ids).await;

        let results = to_search_results(response, &durations);
        debug!(query, result_count = results.len(), "YouTube search complete");
        Ok(results)
    }
}

fn to_search_results(
    response: SearchListResponse,
    durations: &HashMap<String, u32>,
) -> Vec<SearchResult> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id.filter(|id| !id.is_empty())?;
            Some(SearchResult {
                id: video_id.clone(),
                title: item.snippet.title,
                artist: item.snippet.channel_title,
                duration: durations.get(&video_id).copied().unwrap_or(0),
                thumbnail: item.snippet.thumbnails.best(),
                source: ResultSource::Youtube,
                stream_url: format!("https://www.youtube.com/watch?v={}", video_id),
                external_id: Some(video_id),
                description: Some(item.snippet.description).filter(|d| !d.is_empty()),
            })
        })
        .collect()
}

/// Seconds in an ISO-8601 duration such as `PT1H2M3S`. Unparseable input yields 0.
pub fn parse_iso8601_duration(duration: &str) -> u32 {
    let Some(rest) = duration.trim().strip_prefix("PT") else {
        return 0;
    };

    let mut total = 0u32;
    let mut digits = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u32 = match digits.parse() {
            Ok(value) => value,
            Err(_) => return 0,
        };
        digits.clear();
        let unit = match c {
            'H' => 3600,
            'M' => 60,
            'S' => 1,
            _ => return 0,
        };
        total = total.saturating_add(value.saturating_mul(unit));
    }

    if digits.is_empty() {
        total
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::spawn_test_server;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    const SEARCH_BODY: &str = r#"{
        "items": [
            {
                "id": {"kind": "youtube#video", "videoId": "dQw4w9WgXcQ"},
                "snippet": {
                    "title": "Never Gonna Give You Up",
                    "description": "Official video",
                    "channelTitle": "Rick Astley",
                    "thumbnails": {
                        "default": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg"},
                        "medium": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg"},
                        "high": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"}
                    }
                }
            },
            {
                "id": {"kind": "youtube#channel", "channelId": "UC123"},
                "snippet": {"title": "A channel"}
            },
            {
                "id": {"kind": "youtube#video", "videoId": "abc123"},
                "snippet": {
                    "title": "Second",
                    "channelTitle": "Uploader",
                    "thumbnails": {"default": {"url": "https://i.ytimg.com/vi/abc123/default.jpg"}}
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_iso8601_duration("PT4M13S"), 253);
        assert_eq!(parse_iso8601_duration("PT45S"), 45);
        assert_eq!(parse_iso8601_duration("PT3M"), 180);
        assert_eq!(parse_iso8601_duration("PT2H"), 7200);
    }

    #[test]
    fn test_parse_iso8601_duration_invalid() {
        assert_eq!(parse_iso8601_duration(""), 0);
        assert_eq!(parse_iso8601_duration("P1D"), 0);
        assert_eq!(parse_iso8601_duration("PT12"), 0);
        assert_eq!(parse_iso8601_duration("4:13"), 0);
    }

    #[test]
    fn test_converts_videos_and_skips_other_kinds() {
        let response: SearchListResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let durations = HashMap::from([("dQw4w9WgXcQ".to_string(), 213)]);

        let results = to_search_results(response, &durations);

        assert_eq!(results.len(), 2);
        let first = &results[0];
        assert_eq!(first.id, "dQw4w9WgXcQ");
        assert_eq!(first.artist, "Rick Astley");
        assert_eq!(first.duration, 213);
        assert_eq!(first.source, ResultSource::Youtube);
        assert_eq!(first.external_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            first.stream_url,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            first.thumbnail,
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
        assert_eq!(first.description.as_deref(), Some("Official video"));
    }

    #[test]
    fn test_missing_duration_and_thumbnail_fallback() {
        let response: SearchListResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let results = to_search_results(response, &HashMap::new());

        let second = &results[1];
        assert_eq!(second.duration, 0);
        assert_eq!(second.thumbnail, "https://i.ytimg.com/vi/abc123/default.jpg");
        assert_eq!(second.description, None);
    }

    #[tokio::test]
    async fn test_unconfigured_client_errors() {
        let client = YouTubeClient::new("", Duration::from_secs(1));
        assert!(!client.is_configured());
        let err = client.search("anything", 5).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::NotConfigured(ResultSource::Youtube)
        ));
    }

    type Params = Query<HashMap<String, String>>;

    async fn search_endpoint(Query(params): Params) -> (StatusCode, String) {
        if params.get("key").map(String::as_str) != Some("test-key")
            || params.get("q").map(String::as_str) != Some("rick")
        {
            return (StatusCode::FORBIDDEN, String::new());
        }
        (StatusCode::OK, SEARCH_BODY.to_string())
    }

    async fn videos_endpoint(Query(params): Params) -> (StatusCode, String) {
        let ids = params.get("id").cloned().unwrap_or_default();
        if ids != "dQw4w9WgXcQ,abc123" {
            return (StatusCode::BAD_REQUEST, String::new());
        }
        let body = r#"{"items": [
            {"id": "dQw4w9WgXcQ", "contentDetails": {"duration": "PT3M33S"}},
            {"id": "abc123", "contentDetails": {"duration": "PT1H"}}
        ]}"#;
        (StatusCode::OK, body.to_string())
    }

    #[tokio::test]
    async fn test_search_against_local_server() {
        let router = Router::new()
            .route("/search", get(search_endpoint))
            .route("/videos", get(videos_endpoint));
        let base = spawn_test_server(router).await;
        let client = YouTubeClient::new("test-key", Duration::from_secs(2)).with_base_url(base);

        let results = client.search("rick", 10).await.unwrap();

        let durations: Vec<(&str, u32)> = results
            .iter()
            .map(|r| (r.id.as_str(), r.duration))
            .collect();
        assert_eq!(durations, vec![("dQw4w9WgXcQ", 213), ("abc123", 3600)]);
    }

    #[tokio::test]
    async fn test_failed_duration_lookup_keeps_results() {
        let router = Router::new()
            .route("/search", get(search_endpoint))
            .route(
                "/videos",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "backend error") }),
            );
        let base = spawn_test_server(router).await;
        let client = YouTubeClient::new("test-key", Duration::from_secs(2)).with_base_url(base);

        let results = client.search("rick", 10).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.duration == 0));
    }

    #[tokio::test]
    async fn test_search_maps_error_status() {
        let router = Router::new().route("/search", get(search_endpoint));
        let base = spawn_test_server(router).await;
        let client = YouTubeClient::new("wrong-key", Duration::from_secs(2)).with_base_url(base);

        match client.search("rick", 10).await {
            Err(ProviderError::Status { status, .. }) => assert_eq!(status, 403),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_rejects_malformed_body() {
        let router = Router::new().route("/search", get(|| async { "{\"items\": 42}" }));
        let base = spawn_test_server(router).await;
        let client = YouTubeClient::new("test-key", Duration::from_secs(2)).with_base_url(base);

        assert!(matches!(
            client.search("rick", 10).await,
            Err(ProviderError::Decode { .. })
        ));
    }

    #[tokio::test]
    #[ignore] // Requires YOUTUBE_API_KEY and network access
    async fn test_live_search() {
        let client = YouTubeClient::from_env();
        let results = client.search("lofi hip hop", 5).await.unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.source == ResultSource::Youtube));
    }
}
