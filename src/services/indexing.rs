// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Cache-backed scraping with a per-source rolling index of recent tracks.
//!
//! The rolling list is a read-modify-write of a single cache value. Two
//! concurrent `index_url` calls for the same source can both read the old
//! list and one of the prepended tracks is lost. Indexing is best effort, so
//! the list is not locked; closing the gap needs an atomic list primitive in
//! the cache store.

use crate::models::scraper::{IndexedTrackResult, ScrapedMetadata};
use crate::services::cache::{get_json, set_json, Cache};
use crate::services::metrics::Metrics;
use crate::services::scraper::ScrapeError;
use crate::services::scraper_registry::{detect_source_from_url, ScraperRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Lifetime of a scraped track and of the rolling lists
pub const INDEXED_TRACK_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Maximum entries kept in a source's rolling list
pub const ROLLING_LIST_CAP: usize = 1000;

const CACHE_TYPE: &str = "indexed_track";

fn track_key(url: &str) -> String {
    format!("indexed_track:{}", url)
}

fn rolling_list_key(source: &str) -> String {
    format!("indexed_search_all:{}", source)
}

pub struct IndexingService {
    registry: Arc<ScraperRegistry>,
    cache: Arc<dyn Cache>,
    metrics: Arc<Metrics>,
    rolling_list_cap: usize,
}

impl IndexingService {
    pub fn new(
        registry: Arc<ScraperRegistry>,
        cache: Arc<dyn Cache>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            cache,
            metrics,
            rolling_list_cap: ROLLING_LIST_CAP,
        }
    }

    pub fn with_rolling_list_cap(mut self, cap: usize) -> Self {
        self.rolling_list_cap = cap;
        self
    }

    /// Metadata for `url`, from cache when present, otherwise scraped and cached
    pub async fn index_url(&self, url: &str) -> Result<ScrapedMetadata, ScrapeError> {
        let key = track_key(url);

        match get_json::<_, ScrapedMetadata>(self.cache.as_ref(), &key).await {
            Ok(Some(cached)) => {
                self.metrics.record_cache_hit(CACHE_TYPE);
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => debug!(key = %key, error = %e, "Indexed track cache read failed"),
        }
        self.metrics.record_cache_miss(CACHE_TYPE);

        let metadata = match self.registry.scrape_url(url).await {
            Ok(metadata) => metadata,
            Err(e) => {
                error!(url, error = %e, "Failed to scrape URL");
                self.metrics.record_track_indexed(
                    detect_source_from_url(url).unwrap_or("unknown"),
                    "failed",
                );
                return Err(e);
            }
        };

        if let Err(e) = set_json(self.cache.as_ref(), &key, &metadata, INDEXED_TRACK_TTL).await {
            warn!(key = %key, error = %e, "Failed to cache indexed track");
        }
        self.prepend_to_rolling_list(&metadata).await;

        debug!(
            url,
            artist = %metadata.artist,
            title = %metadata.title,
            source = %metadata.source,
            "Track indexed"
        );
        self.metrics.record_track_indexed(&metadata.source, "success");

        Ok(metadata)
    }

    /// Index every URL in order. Returns `(succeeded, failed)`.
    pub async fn index_batch(&self, urls: &[String]) -> (usize, usize) {
        let mut succeeded = 0;
        let mut failed = 0;

        for url in urls {
            match self.index_url(url).await {
                Ok(_) => succeeded += 1,
                Err(_) => failed += 1,
            }
        }

        (succeeded, failed)
    }

    async fn load_rolling_list(&self, source: &str) -> Vec<ScrapedMetadata> {
        match get_json(self.cache.as_ref(), &rolling_list_key(source)).await {
            Ok(Some(tracks)) => tracks,
            Ok(None) => Vec::new(),
            Err(e) => {
                debug!(source, error = %e, "Rolling index read failed");
                Vec::new()
            }
        }
    }

    async fn prepend_to_rolling_list(&self, metadata: &ScrapedMetadata) {
        let mut tracks = self.load_rolling_list(&metadata.source).await;
        tracks.insert(0, metadata.clone());
        tracks.truncate(self.rolling_list_cap);

        let key = rolling_list_key(&metadata.source);
        if let Err(e) = set_json(self.cache.as_ref(), &key, &tracks, INDEXED_TRACK_TTL).await {
            warn!(key = %key, error = %e, "Failed to update rolling index");
        }
    }

    /// Most recently indexed tracks for a source, newest first
    pub async fn get_indexed_tracks(&self, source: &str, limit: usize) -> Vec<ScrapedMetadata> {
        let mut tracks = self.load_rolling_list(source).await;
        tracks.truncate(limit);
        tracks
    }

    /// Case-insensitive substring match on title or artist, newest first,
    /// stopping after `limit` matches
    pub async fn search_indexed_tracks(
        &self,
        source: &str,
        query: &str,
        limit: usize,
    ) -> Vec<IndexedTrackResult> {
        let needle = query.to_lowercase();
        self.load_rolling_list(source)
            .await
            .into_iter()
            .filter(|track| {
                track.title.to_lowercase().contains(&needle)
                    || track.artist.to_lowercase().contains(&needle)
            })
            .take(limit)
            .map(IndexedTrackResult::from)
            .collect()
    }
}
