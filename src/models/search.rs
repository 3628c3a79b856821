// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result count used when the caller does not ask for one (or asks for a non-positive one)
pub const DEFAULT_MAX_RESULTS: i64 = 20;

/// Upper bound on results returned by a single search
pub const MAX_RESULTS_CAP: i64 = 50;

/// Origin of a search result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// Tracks uploaded to the local catalog
    Local,
    Youtube,
    Soundcloud,
}

impl ResultSource {
    pub const ALL: [ResultSource; 3] = [
        ResultSource::Local,
        ResultSource::Youtube,
        ResultSource::Soundcloud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Local => "local",
            ResultSource::Youtube => "youtube",
            ResultSource::Soundcloud => "soundcloud",
        }
    }

    /// Parse a source tag, case-insensitively
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(tag.trim()))
    }
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified track record produced by the local catalog or an external provider.
///
/// `id` is only unique within its `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    /// Artist name, or channel/uploader name for external providers
    pub artist: String,
    /// Duration in seconds (0 when unknown)
    pub duration: u32,
    pub thumbnail: String,
    pub source: ResultSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Playable stream reference (local serve path or provider page URL)
    pub stream_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Search parameters as received from a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Raw query text
    #[serde(rename = "q", default)]
    pub query: String,
    /// Optional source filter: "local", a provider name, or unset for all sources
    #[serde(default)]
    pub source: Option<String>,
    /// Requested result cap
    #[serde(default)]
    pub max_results: Option<i64>,
}

/// Which sources a query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter {
    All,
    Only(ResultSource),
}

impl SourceFilter {
    /// Tag used in cache keys and responses
    pub fn tag(&self) -> &'static str {
        match self {
            SourceFilter::All => "all",
            SourceFilter::Only(source) => source.as_str(),
        }
    }
}

/// Validated, normalized form of a [`SearchRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub filter: SourceFilter,
    pub max_results: usize,
}

impl SearchQuery {
    /// Cache key for this query. Exact match only, so two queries share a cache
    /// entry only when their normalized text, filter and cap are identical.
    pub fn cache_key(&self) -> String {
        format!(
            "search:{}:{}:{}",
            self.filter.tag(),
            self.text,
            self.max_results
        )
    }
}

/// Lower-case, trim and collapse internal whitespace
pub fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Apply the default for absent/non-positive caps and clamp to [`MAX_RESULTS_CAP`]
pub fn clamp_max_results(requested: Option<i64>) -> usize {
    match requested {
        Some(n) if n > 0 => n.min(MAX_RESULTS_CAP) as usize,
        _ => DEFAULT_MAX_RESULTS as usize,
    }
}

/// Search results with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The query as normalized
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_count: usize,
    /// "all" or the single source that was searched
    pub source: String,
    /// Set only when the response was served from cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    pub searched_at: DateTime<Utc>,
}

/// Envelope for successful search API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Whether a query currently has a cached response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub key: String,
    pub cached: bool,
    /// Remaining time to live in seconds, when cached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}
