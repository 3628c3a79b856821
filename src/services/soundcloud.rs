// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! SoundCloud track search provider.

use crate::models::search::{ResultSource, SearchResult};
use crate::services::provider::{
    build_http_client, decode, fetch_json_body, provider_timeout_from_env, ProviderError,
    TrackProvider,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.soundcloud.com";
const DEFAULT_ARTWORK: &str = "https://a-v2.sndcdn.com/assets/images/sc-icons/ios-a62dfc8f.png";
const LARGE_ARTWORK: &str = "t500x500.jpg";

#[derive(Debug, Deserialize)]
struct TrackCollection {
    #[serde(default)]
    collection: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    /// Milliseconds
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    user: User,
    #[serde(default)]
    artwork_url: Option<String>,
    #[serde(default)]
    permalink_url: String,
    #[serde(default)]
    streamable: bool,
}

#[derive(Debug, Default, Deserialize)]
struct User {
    #[serde(default)]
    username: String,
}

pub struct SoundCloudClient {
    client_id: String,
    base_url: String,
    http: reqwest::Client,
}

impl SoundCloudClient {
    pub fn new(client_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client_id: client_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: build_http_client(timeout),
        }
    }

    /// Build from `SOUNDCLOUD_CLIENT_ID`; an unset id leaves the provider unconfigured
    pub fn from_env() -> Self {
        Self::new(
            env::var("SOUNDCLOUD_CLIENT_ID").unwrap_or_default(),
            provider_timeout_from_env(),
        )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TrackProvider for SoundCloudClient {
    fn source(&self) -> ResultSource {
        ResultSource::Soundcloud
    }

    fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured(ResultSource::Soundcloud));
        }

        let limit = max_results.to_string();
        let url = url::Url::parse_with_params(
            &format!("{}/tracks", self.base_url),
            &[
                ("q", query),
                ("client_id", self.client_id.as_str()),
                ("limit", limit.as_str()),
                ("linked_partitioning", "1"),
            ],
        )
        .map_err(|e| ProviderError::Other(format!("invalid SoundCloud URL: {}", e)))?;

        let body = fetch_json_body(&self.http, ResultSource::Soundcloud, url).await?;
        let response: TrackCollection = decode(ResultSource::Soundcloud, &body)?;

        let results = to_search_results(response, max_results);
        debug!(query, result_count = results.len(), "SoundCloud search complete");
        Ok(results)
    }
}

fn to_search_results(response: TrackCollection, max_results: usize) -> Vec<SearchResult> {
    response
        .collection
        .into_iter()
        .filter(|track| track.streamable)
        .take(max_results)
        .map(|track| {
            let id = track.id.to_string();
            SearchResult {
                id: id.clone(),
                title: track.title,
                artist: track.user.username,
                duration: (track.duration / 1000).min(u32::MAX as u64) as u32,
                thumbnail: artwork_or_default(track.artwork_url.as_deref()),
                source: ResultSource::Soundcloud,
                external_id: Some(id),
                stream_url: track.permalink_url,
                description: track.description.filter(|d| !d.is_empty()),
            }
        })
        .collect()
}

fn artwork_or_default(artwork_url: Option<&str>) -> String {
    match artwork_url {
        Some(url) if !url.is_empty() => upgrade_artwork(url),
        _ => DEFAULT_ARTWORK.to_string(),
    }
}

/// Swap the small artwork variants SoundCloud returns for the 500x500 one
pub fn upgrade_artwork(url: &str) -> String {
    for small in ["large.jpg", "t300x300.jpg", "crop.jpg"] {
        if let Some(prefix) = url.strip_suffix(small) {
            return format!("{}{}", prefix, LARGE_ARTWORK);
        }
    }
    url.to_string()
}
