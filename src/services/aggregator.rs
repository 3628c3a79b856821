// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Concurrent fan-out of one query to every available source.
//!
//! Each source runs in its own task under a shared deadline and sends its
//! results back through the task's join handle. Results are merged
//! source-major in completion order, so the order across sources can differ
//! between two calls with the same query. A source that errors, panics or
//! misses the deadline contributes nothing.

use crate::models::search::{ResultSource, SearchResult};
use crate::services::provider::{ProviderError, TrackProvider, DEFAULT_PROVIDER_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Smallest per-source budget, so a small total does not starve sources
pub const MIN_RESULTS_PER_SOURCE: usize = 5;

pub struct Aggregator {
    sources: Vec<Arc<dyn TrackProvider>>,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn TrackProvider>>) -> Self {
        Self {
            sources,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Deadline shared by every source task of one search
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sources that can currently be queried
    pub fn available_sources(&self) -> Vec<ResultSource> {
        self.available().map(|provider| provider.source()).collect()
    }

    fn available(&self) -> impl Iterator<Item = &Arc<dyn TrackProvider>> {
        self.sources.iter().filter(|provider| provider.is_configured())
    }

    /// Query all available sources concurrently and merge up to `max_results` results.
    ///
    /// Never fails: when every source fails the result is empty.
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        let available: Vec<Arc<dyn TrackProvider>> = self.available().cloned().collect();
        if available.is_empty() || max_results == 0 {
            return Vec::new();
        }

        let budget = per_source_budget(max_results, available.len());
        let deadline = Instant::now() + self.timeout;

        // Dropping the set aborts every source task still in flight
        let mut tasks = JoinSet::new();
        for provider in available {
            let query = query.to_string();
            tasks.spawn(async move {
                let source = provider.source();
                let outcome = match timeout_at(deadline, provider.search(&query, budget)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Other("deadline exceeded".to_string())),
                };
                (source, outcome)
            });
        }

        let mut merged = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, Ok(results))) => {
                    debug!(%source, result_count = results.len(), "Source search complete");
                    merged.extend(results);
                }
                Ok((source, Err(e))) => {
                    warn!(%source, error = %e, "Source search failed");
                }
                Err(e) => {
                    warn!(error = %e, "Source search task aborted");
                }
            }
        }

        merged.truncate(max_results);
        merged
    }

    /// Query exactly one source, bypassing the fan-out
    pub async fn search_by_source(
        &self,
        query: &str,
        source: ResultSource,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let provider = self
            .available()
            .find(|provider| provider.source() == source)
            .ok_or(ProviderError::NotConfigured(source))?;

        let mut results = tokio::time::timeout(self.timeout, provider.search(query, max_results))
            .await
            .map_err(|_| ProviderError::Request {
                provider: source,
                message: "deadline exceeded".to_string(),
            })??;
        results.truncate(max_results);
        Ok(results)
    }
}

/// `max(max_results / sources, MIN_RESULTS_PER_SOURCE)`
pub fn per_source_budget(max_results: usize, source_count: usize) -> usize {
    if source_count == 0 {
        return max_results;
    }
    (max_results / source_count).max(MIN_RESULTS_PER_SOURCE)
}
