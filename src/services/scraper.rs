// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Per-source extraction of track metadata from third-party pages.
//!
//! Pages are fetched through a [`PageFetcher`] and parsed with the `scraper`
//! crate. `scraper::Html` is not `Send`, so parsing happens in plain
//! functions after the fetch has completed.

use crate::models::scraper::ScrapedMetadata;
use crate::services::youtube::parse_iso8601_duration;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),
    #[error("no scraper for source: {0}")]
    NoScraper(String),
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },
}

/// Fetches the raw HTML of a page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

/// HTTP GET with a browser-like user agent. Anything but 200 is an error.
pub struct HtmlFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HtmlFetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            user_agent: user_agent.into(),
        }
    }

    /// User agent from `SCRAPER_USER_AGENT`, falling back to [`DEFAULT_USER_AGENT`]
    pub fn from_env() -> Self {
        let user_agent = env::var("SCRAPER_USER_AGENT")
            .ok()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        Self::new(user_agent)
    }
}

#[async_trait]
impl PageFetcher for HtmlFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| ScrapeError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(|e| ScrapeError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Extracts metadata for one source
#[async_trait]
pub trait MetadataScraper: Send + Sync {
    async fn scrape_track(&self, url: &str) -> Result<ScrapedMetadata, ScrapeError>;

    /// Search the source for tracks. Scrapers without search support return nothing.
    async fn search_tracks(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScrapedMetadata>, ScrapeError>;

    fn source_name(&self) -> &str;
}

/// Seconds in a duration written as `M:S` or ISO-8601 `PT#H#M#S`; 0 otherwise
pub fn extract_duration(value: &str) -> u32 {
    let value = value.trim();

    if let Some((minutes, seconds)) = value.split_once(':') {
        let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        if all_digits(minutes) && all_digits(seconds) {
            let minutes: u32 = minutes.parse().unwrap_or(0);
            let seconds: u32 = seconds.parse().unwrap_or(0);
            return minutes.saturating_mul(60).saturating_add(seconds);
        }
        return 0;
    }

    if value.starts_with("PT") {
        return parse_iso8601_duration(value);
    }

    0
}

/// `content` of the first element matching `selector`, if non-empty
fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return None;
    };
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

/// Page `<title>` text, used when a page has no `og:title`
fn document_title(document: &Html) -> Option<String> {
    let Ok(selector) = Selector::parse("title") else {
        return None;
    };
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Open Graph fields shared by every supported page
fn open_graph(document: &Html, metadata: &mut ScrapedMetadata) {
    if let Some(title) =
        meta_content(document, "meta[property='og:title']").or_else(|| document_title(document))
    {
        metadata.title = title;
    }
    if let Some(thumbnail) = meta_content(document, "meta[property='og:image']") {
        metadata.thumbnail = thumbnail;
    }
    if let Some(description) = meta_content(document, "meta[property='og:description']") {
        metadata.description = description;
    }
}

pub const AUDIOMACK: &str = "audiomack";
pub const BOOMPLAY: &str = "boomplay";

pub struct AudiomackScraper {
    fetcher: Arc<dyn PageFetcher>,
}

impl AudiomackScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

/// Audiomack pages carry the artist and duration in `music:*` meta tags
pub fn parse_audiomack_page(url: &str, html: &str) -> ScrapedMetadata {
    let document = Html::parse_document(html);
    let mut metadata = ScrapedMetadata::new(AUDIOMACK, url);

    open_graph(&document, &mut metadata);
    if let Some(artist) = meta_content(&document, "meta[name='music:musician']") {
        metadata.artist = artist;
    }
    if let Some(duration) = meta_content(&document, "meta[property='music:duration']") {
        metadata.duration = extract_duration(&duration);
    }

    metadata
}

#[async_trait]
impl MetadataScraper for AudiomackScraper {
    async fn scrape_track(&self, url: &str) -> Result<ScrapedMetadata, ScrapeError> {
        let html = self.fetcher.fetch(url).await?;
        let metadata = parse_audiomack_page(url, &html);
        debug!(url, title = %metadata.title, "Scraped Audiomack track");
        Ok(metadata)
    }

    async fn search_tracks(
        &self,
        query: &str,
        _limit: usize,
    ) -> Result<Vec<ScrapedMetadata>, ScrapeError> {
        info!(query, "Audiomack search is not supported");
        Ok(Vec::new())
    }

    fn source_name(&self) -> &str {
        AUDIOMACK
    }
}

pub struct BoomplayScraper {
    fetcher: Arc<dyn PageFetcher>,
}

impl BoomplayScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

/// Boomplay titles read "Artist - Title"
pub fn parse_boomplay_page(url: &str, html: &str) -> ScrapedMetadata {
    let document = Html::parse_document(html);
    let mut metadata = ScrapedMetadata::new(BOOMPLAY, url);

    open_graph(&document, &mut metadata);
    if let Some((artist, title)) = metadata.title.split_once(" - ") {
        let (artist, title) = (artist.trim().to_string(), title.trim().to_string());
        metadata.artist = artist;
        metadata.title = title;
    }

    metadata
}

#[async_trait]
impl MetadataScraper for BoomplayScraper {
    async fn scrape_track(&self, url: &str) -> Result<ScrapedMetadata, ScrapeError> {
        let html = self.fetcher.fetch(url).await?;
        let metadata = parse_boomplay_page(url, &html);
        debug!(url, title = %metadata.title, "Scraped Boomplay track");
        Ok(metadata)
    }

    async fn search_tracks(
        &self,
        query: &str,
        _limit: usize,
    ) -> Result<Vec<ScrapedMetadata>, ScrapeError> {
        info!(query, "Boomplay search is not supported");
        Ok(Vec::new())
    }

    fn source_name(&self) -> &str {
        BOOMPLAY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUDIOMACK_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Essence | Audiomack</title>
    <meta property="og:title" content="Essence" />
    <meta name="music:musician" content="Wizkid" />
    <meta property="og:image" content="https://assets.audiomack.com/wizkid/essence.jpg" />
    <meta property="og:description" content="Stream Essence by Wizkid" />
    <meta property="music:duration" content="4:08" />
</head>
<body></body>
</html>"#;

    const BOOMPLAY_PAGE: &str = r#"<html><head>
    <meta property="og:title" content="Burna Boy - Last Last" />
    <meta property="og:image" content="https://source.boomplaymusic.com/last-last.jpg" />
</head></html>"#;

    struct StaticFetcher(&'static str);

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, ScrapeError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_extract_duration_clock_format() {
        assert_eq!(extract_duration("4:08"), 248);
        assert_eq!(extract_duration("0:59"), 59);
        assert_eq!(extract_duration("62:00"), 3720);
    }

    #[test]
    fn test_extract_duration_iso8601() {
        assert_eq!(extract_duration("PT3M45S"), 225);
        assert_eq!(extract_duration("PT1H0M1S"), 3601);
    }

    #[test]
    fn test_extract_duration_unrecognized() {
        assert_eq!(extract_duration(""), 0);
        assert_eq!(extract_duration("245"), 0);
        assert_eq!(extract_duration("4:08:10"), 0);
        assert_eq!(extract_duration("four minutes"), 0);
    }

    #[test]
    fn test_parse_audiomack_page() {
        let url = "https://audiomack.com/wizkid/song/essence";
        let metadata = parse_audiomack_page(url, AUDIOMACK_PAGE);

        assert_eq!(metadata.title, "Essence");
        assert_eq!(metadata.artist, "Wizkid");
        assert_eq!(metadata.duration, 248);
        assert_eq!(
            metadata.thumbnail,
            "https://assets.audiomack.com/wizkid/essence.jpg"
        );
        assert_eq!(metadata.description, "Stream Essence by Wizkid");
        assert_eq!(metadata.source, "audiomack");
        assert_eq!(metadata.source_url, url);
        assert_eq!(metadata.id.len(), 32);
    }

    #[test]
    fn test_parse_boomplay_splits_artist_from_title() {
        let metadata = parse_boomplay_page("https://www.boomplay.com/songs/1", BOOMPLAY_PAGE);

        assert_eq!(metadata.artist, "Burna Boy");
        assert_eq!(metadata.title, "Last Last");
        assert_eq!(metadata.duration, 0);
    }

    #[test]
    fn test_falls_back_to_title_tag() {
        let html = "<html><head><title> Untitled Jam </title></head></html>";
        let metadata = parse_boomplay_page("https://www.boomplay.com/songs/2", html);
        assert_eq!(metadata.title, "Untitled Jam");
        assert!(metadata.artist.is_empty());
    }

    #[tokio::test]
    async fn test_scraper_uses_fetcher() {
        let scraper = AudiomackScraper::new(Arc::new(StaticFetcher(AUDIOMACK_PAGE)));
        let metadata = scraper
            .scrape_track("https://audiomack.com/wizkid/song/essence")
            .await
            .unwrap();
        assert_eq!(metadata.artist, "Wizkid");
        assert_eq!(scraper.source_name(), "audiomack");
    }

    #[tokio::test]
    async fn test_search_is_an_empty_stub() {
        let scraper = BoomplayScraper::new(Arc::new(StaticFetcher(BOOMPLAY_PAGE)));
        assert!(scraper.search_tracks("burna", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_non_200_is_error() {
        let fetcher = HtmlFetcher::new(DEFAULT_USER_AGENT);
        let result = fetcher.fetch("https://httpbin.org/status/404").await;
        assert!(matches!(result, Err(ScrapeError::Status { status: 404, .. })));
    }
}
