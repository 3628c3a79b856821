// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! URL classification and dispatch to the scraper registered for a source.

use crate::models::scraper::ScrapedMetadata;
use crate::services::scraper::{
    AudiomackScraper, BoomplayScraper, MetadataScraper, PageFetcher, ScrapeError,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Host substrings for every recognized source, checked in order
const KNOWN_HOSTS: &[(&str, &str)] = &[
    ("audiomack.com", "audiomack"),
    ("boomplay.com", "boomplay"),
    ("soundcloud.com", "soundcloud"),
    ("youtube.com", "youtube"),
    ("youtu.be", "youtube"),
];

/// Source tag for a URL, or `None` when no known host appears in it
pub fn detect_source_from_url(url: &str) -> Option<&'static str> {
    let url = url.to_lowercase();
    KNOWN_HOSTS
        .iter()
        .find(|(host, _)| url.contains(host))
        .map(|(_, source)| *source)
}

#[derive(Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<String, Arc<dyn MetadataScraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Audiomack and Boomplay scrapers
    pub fn with_default_scrapers(fetcher: Arc<dyn PageFetcher>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AudiomackScraper::new(fetcher.clone())));
        registry.register(Arc::new(BoomplayScraper::new(fetcher)));
        registry
    }

    /// Register a scraper under its own source name, replacing any previous one
    pub fn register(&mut self, scraper: Arc<dyn MetadataScraper>) {
        self.scrapers
            .insert(scraper.source_name().to_string(), scraper);
    }

    pub fn get(&self, source: &str) -> Option<Arc<dyn MetadataScraper>> {
        self.scrapers.get(source).cloned()
    }

    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.scrapers.keys().cloned().collect();
        sources.sort();
        sources
    }

    /// Detect the URL's source and scrape it with that source's scraper
    pub async fn scrape_url(&self, url: &str) -> Result<ScrapedMetadata, ScrapeError> {
        let source = detect_source_from_url(url)
            .ok_or_else(|| ScrapeError::UnsupportedUrl(url.to_string()))?;
        let scraper = self
            .get(source)
            .ok_or_else(|| ScrapeError::NoScraper(source.to_string()))?;
        scraper.scrape_track(url).await
    }
}
