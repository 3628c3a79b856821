// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Track metadata extracted from a third-party page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedMetadata {
    /// Stable across re-scrapes of the same URL, see [`generate_track_id`]
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Duration in seconds (0 when the page does not expose one)
    pub duration: u32,
    pub thumbnail: String,
    pub source_url: String,
    pub source: String,
    pub description: String,
    pub release_date: Option<NaiveDate>,
    pub genre: String,
}

impl ScrapedMetadata {
    /// Empty metadata stamped with the id, URL and source
    pub fn new(source: &str, url: &str) -> Self {
        Self {
            id: generate_track_id(source, url),
            source_url: url.to_string(),
            source: source.to_string(),
            ..Default::default()
        }
    }
}

/// Deterministic id for a scraped track: md5 of `source:url`
pub fn generate_track_id(source: &str, url: &str) -> String {
    format!("{:x}", md5::compute(format!("{}:{}", source, url)))
}

/// Request to index a single URL
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexUrlRequest {
    pub url: String,
}

/// Public projection of an indexed track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedTrackResult {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub duration: u32,
    pub thumbnail: String,
    pub source: String,
    pub source_url: String,
    pub description: String,
}

impl From<ScrapedMetadata> for IndexedTrackResult {
    fn from(metadata: ScrapedMetadata) -> Self {
        Self {
            id: metadata.id,
            title: metadata.title,
            artist: metadata.artist,
            duration: metadata.duration,
            thumbnail: metadata.thumbnail,
            source: metadata.source,
            source_url: metadata.source_url,
            description: metadata.description,
        }
    }
}

/// Query parameters for searching a source's indexed tracks
#[derive(Debug, Default, Deserialize)]
pub struct IndexedSearchParams {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

/// Query parameters for listing a source's most recent indexed tracks
#[derive(Debug, Default, Deserialize)]
pub struct IndexedListParams {
    pub limit: Option<usize>,
}

/// Indexed tracks returned to HTTP clients
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexedTracksResponse {
    pub source: String,
    pub tracks: Vec<IndexedTrackResult>,
    pub count: usize,
}
