// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Local track catalog and its adapter into the search fan-out.

use crate::models::catalog::CatalogTrack;
use crate::models::search::{ResultSource, SearchResult};
use crate::services::provider::{ProviderError, TrackProvider};
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Read access to locally stored tracks
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    /// Tracks whose title contains `needle`, case-insensitively
    async fn find_by_title(&self, needle: &str) -> anyhow::Result<Vec<CatalogTrack>>;

    /// Tracks whose artist name contains `needle`, case-insensitively
    async fn find_by_artist(&self, needle: &str) -> anyhow::Result<Vec<CatalogTrack>>;
}

/// Catalog held in memory, optionally loaded from a JSON array of tracks
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tracks: Vec<CatalogTrack>,
}

impl InMemoryCatalog {
    pub fn new(tracks: Vec<CatalogTrack>) -> Self {
        Self { tracks }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let tracks: Vec<CatalogTrack> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;
        info!(path = %path.display(), track_count = tracks.len(), "Loaded local catalog");
        Ok(Self::new(tracks))
    }

    /// Catalog from `CATALOG_PATH`, or an empty one when unset
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var("CATALOG_PATH") {
            Ok(path) if !path.is_empty() => Self::from_json_file(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn matching(&self, needle: &str, field: impl Fn(&CatalogTrack) -> &str) -> Vec<CatalogTrack> {
        let needle = needle.to_lowercase();
        self.tracks
            .iter()
            .filter(|track| field(track).to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TrackCatalog for InMemoryCatalog {
    async fn find_by_title(&self, needle: &str) -> anyhow::Result<Vec<CatalogTrack>> {
        Ok(self.matching(needle, |track| track.title.as_str()))
    }

    async fn find_by_artist(&self, needle: &str) -> anyhow::Result<Vec<CatalogTrack>> {
        Ok(self.matching(needle, |track| track.artist_name.as_str()))
    }
}

/// Exposes a [`TrackCatalog`] as the always-available `local` search source
pub struct LocalCatalogSource {
    catalog: Arc<dyn TrackCatalog>,
}

impl LocalCatalogSource {
    pub fn new(catalog: Arc<dyn TrackCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl TrackProvider for LocalCatalogSource {
    fn source(&self) -> ResultSource {
        ResultSource::Local
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let by_title = self
            .catalog
            .find_by_title(query)
            .await
            .map_err(|e| ProviderError::Other(format!("catalog title search failed: {:#}", e)))?;
        let by_artist = self
            .catalog
            .find_by_artist(query)
            .await
            .map_err(|e| ProviderError::Other(format!("catalog artist search failed: {:#}", e)))?;

        // A track can match on both title and artist
        let mut seen = HashSet::new();
        let results = by_title
            .into_iter()
            .chain(by_artist)
            .filter(|track| seen.insert(track.id))
            .take(max_results)
            .map(to_search_result)
            .collect();
        Ok(results)
    }
}

fn to_search_result(track: CatalogTrack) -> SearchResult {
    SearchResult {
        id: track.id.to_string(),
        stream_url: track.stream_url(),
        title: track.title,
        artist: track.artist_name,
        duration: track.duration,
        thumbnail: track.thumbnail,
        source: ResultSource::Local,
        external_id: None,
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use uuid::Uuid;

    fn track(title: &str, artist: &str) -> CatalogTrack {
        CatalogTrack {
            id: Uuid::now_v7(),
            title: title.to_string(),
            artist_name: artist.to_string(),
            duration: 200,
            thumbnail: String::new(),
            file: format!("{}.mp3", title.to_lowercase().replace(' ', "-")),
        }
    }

    #[tokio::test]
    async fn test_catalog_matches_case_insensitively() {
        let catalog = InMemoryCatalog::new(vec![
            track("Blue Monday", "New Order"),
            track("Bizarre Love Triangle", "New Order"),
            track("Blue Light", "Bloc Party"),
        ]);

        assert_eq!(catalog.find_by_title("BLUE").await.unwrap().len(), 2);
        assert_eq!(catalog.find_by_artist("new order").await.unwrap().len(), 2);
        assert!(catalog.find_by_artist("joy division").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_source_deduplicates_title_and_artist_matches() {
        // "order" matches "New Order" as artist and "Order Form" as title
        let catalog = InMemoryCatalog::new(vec![
            track("Order Form", "New Order"),
            track("Regret", "New Order"),
        ]);
        let source = LocalCatalogSource::new(Arc::new(catalog));

        let results = source.search("order", 20).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Order Form");
        assert_eq!(results[1].title, "Regret");
        assert!(results.iter().all(|r| r.source == ResultSource::Local));
        assert_eq!(results[0].stream_url, "/api/v1/serve/order-form.mp3");
    }

    #[tokio::test]
    async fn test_local_source_respects_max_results() {
        let catalog = InMemoryCatalog::new(vec![
            track("Song A", "Band"),
            track("Song B", "Band"),
            track("Song C", "Band"),
        ]);
        let source = LocalCatalogSource::new(Arc::new(catalog));

        assert_eq!(source.search("song", 2).await.unwrap().len(), 2);
    }

    #[test]
    fn test_load_catalog_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let tracks = vec![track("Heroes", "David Bowie")];
        write!(file, "{}", serde_json::to_string(&tracks).unwrap()).unwrap();

        let catalog = InMemoryCatalog::from_json_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_load_catalog_missing_file_fails() {
        assert!(InMemoryCatalog::from_json_file("/nonexistent/catalog.json").is_err());
    }
}
