// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Cache-aside search over the aggregator.

use crate::models::search::{
    clamp_max_results, normalize_query, CacheStatus, ResultSource, SearchQuery, SearchRequest,
    SearchResponse, SourceFilter,
};
use crate::services::aggregator::Aggregator;
use crate::services::cache::{get_json, set_json, Cache};
use crate::services::metrics::Metrics;
use crate::services::provider::ProviderError;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long a search response stays cached
pub const SEARCH_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const CACHE_TYPE: &str = "search";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search query must not be empty")]
    EmptyQuery,
    #[error("unknown source '{0}'")]
    UnknownSource(String),
    #[error("source '{0}' is not available")]
    SourceUnavailable(ResultSource),
    #[error(transparent)]
    Provider(ProviderError),
}

impl SearchError {
    /// Rejected before reaching the cache or any source
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SearchError::EmptyQuery
                | SearchError::UnknownSource(_)
                | SearchError::SourceUnavailable(_)
        )
    }
}

impl From<ProviderError> for SearchError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(source) => SearchError::SourceUnavailable(source),
            other => SearchError::Provider(other),
        }
    }
}

/// Validate and normalize a raw request
pub fn parse_request(request: &SearchRequest) -> Result<SearchQuery, SearchError> {
    let text = normalize_query(&request.query);
    if text.is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    let filter = match request.source.as_deref().map(str::trim) {
        None | Some("") | Some("all") => SourceFilter::All,
        Some(tag) => ResultSource::parse(tag)
            .map(SourceFilter::Only)
            .ok_or_else(|| SearchError::UnknownSource(tag.to_string()))?,
    };

    Ok(SearchQuery {
        text,
        filter,
        max_results: clamp_max_results(request.max_results),
    })
}

pub struct SearchService {
    aggregator: Arc<Aggregator>,
    cache: Arc<dyn Cache>,
    metrics: Arc<Metrics>,
}

impl SearchService {
    pub fn new(aggregator: Arc<Aggregator>, cache: Arc<dyn Cache>, metrics: Arc<Metrics>) -> Self {
        Self {
            aggregator,
            cache,
            metrics,
        }
    }

    /// Serve from cache when possible, otherwise search and cache the response
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, SearchError> {
        let query = parse_request(&request)?;
        let key = query.cache_key();
        let started = Instant::now();

        match get_json::<_, SearchResponse>(self.cache.as_ref(), &key).await {
            Ok(Some(mut cached)) => {
                self.metrics.record_cache_hit(CACHE_TYPE);
                cached.cached_at = Some(Utc::now());
                debug!(query = %query.text, key = %key, "Search served from cache");
                return Ok(cached);
            }
            Ok(None) => self.metrics.record_cache_miss(CACHE_TYPE),
            Err(e) => {
                self.metrics.record_cache_miss(CACHE_TYPE);
                warn!(key = %key, error = %e, "Search cache read failed");
            }
        }

        let source_tag = query.filter.tag();
        let results = match query.filter {
            SourceFilter::All => {
                self.aggregator
                    .search(&query.text, query.max_results)
                    .await
            }
            SourceFilter::Only(source) => match self
                .aggregator
                .search_by_source(&query.text, source, query.max_results)
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    self.metrics
                        .record_search_request(source_tag, "error", started.elapsed());
                    return Err(e.into());
                }
            },
        };

        let response = SearchResponse {
            query: query.text.clone(),
            total_count: results.len(),
            results,
            source: source_tag.to_string(),
            cached_at: None,
            searched_at: Utc::now(),
        };

        if let Err(e) = set_json(self.cache.as_ref(), &key, &response, SEARCH_CACHE_TTL).await {
            warn!(key = %key, error = %e, "Failed to cache search response");
        }

        self.metrics
            .record_search_request(source_tag, "success", started.elapsed());
        info!(
            query = %query.text,
            source = source_tag,
            result_count = response.total_count,
            "Search complete"
        );
        Ok(response)
    }

    /// Drop the cached response for a request, if any
    pub async fn invalidate_cache(&self, request: &SearchRequest) -> Result<(), SearchError> {
        let key = parse_request(request)?.cache_key();
        if let Err(e) = self.cache.del(&key).await {
            warn!(key = %key, error = %e, "Failed to invalidate search cache");
        }
        Ok(())
    }

    /// Whether a request currently has a cached response, and for how long
    pub async fn cache_status(&self, request: &SearchRequest) -> Result<CacheStatus, SearchError> {
        let key = parse_request(request)?.cache_key();

        let cached = match self.cache.exists(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read search cache status");
                false
            }
        };
        let ttl_secs = if cached {
            self.cache.ttl(&key).await.ok().flatten().map(|ttl| ttl.as_secs())
        } else {
            None
        };

        Ok(CacheStatus {
            key,
            cached,
            ttl_secs,
        })
    }
}
