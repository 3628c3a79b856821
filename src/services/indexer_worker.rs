// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Scheduled indexing of every configured source.
//!
//! `start` runs one pass immediately and then one per interval tick until the
//! shutdown signal flips to `true`. Shutdown is observed between passes only:
//! a pass in flight always runs to completion. Wrap `run_indexing_once` in a
//! timeout when a pass must be bounded.

use crate::models::indexer::{
    ExternalSourcesConfig, IndexerSourceJob, PassReport, SourceReport, WorkerState,
};
use crate::services::indexing::IndexingService;
use crate::services::metrics::Metrics;
use futures::future::join_all;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval_at, sleep, MissedTickBehavior};
use tracing::{error, info, warn};

/// Upper bound of the random delay before each scheduled pass
const MAX_JITTER_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read external sources file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse external sources file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("no sources with URLs in {path}")]
    NoSources { path: PathBuf },
}

/// Parse an external sources file, keeping only sources with at least one URL
pub fn read_sources_file(path: &Path) -> Result<BTreeMap<String, Vec<String>>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ExternalSourcesConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let sources: BTreeMap<String, Vec<String>> = config
        .sources
        .into_iter()
        .filter(|(_, urls)| !urls.is_empty())
        .collect();
    if sources.is_empty() {
        return Err(ConfigError::NoSources {
            path: path.to_path_buf(),
        });
    }
    Ok(sources)
}

pub struct IndexerWorker {
    service: Arc<IndexingService>,
    metrics: Arc<Metrics>,
    interval: Duration,
    url_lists: RwLock<BTreeMap<String, Vec<String>>>,
    state: Mutex<WorkerState>,
    passes: AtomicU64,
}

impl IndexerWorker {
    pub fn new(service: Arc<IndexingService>, metrics: Arc<Metrics>, interval: Duration) -> Self {
        Self {
            service,
            metrics,
            interval,
            url_lists: RwLock::new(BTreeMap::new()),
            state: Mutex::new(WorkerState::Idle),
            passes: AtomicU64::new(0),
        }
    }

    /// Register or replace the URL list for a source
    pub fn add_url_list(&self, source: impl Into<String>, urls: Vec<String>) {
        let mut lists = self
            .url_lists
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        lists.insert(source.into(), urls);
    }

    /// Replace the configured sources with the contents of `path`.
    /// Returns the number of sources loaded.
    pub fn load_sources(&self, path: impl AsRef<Path>) -> Result<usize, ConfigError> {
        let path = path.as_ref();
        let sources = match read_sources_file(path) {
            Ok(sources) => sources,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load external sources");
                return Err(e);
            }
        };

        for (source, urls) in &sources {
            info!(source = %source, url_count = urls.len(), "Loaded external source");
        }
        let count = sources.len();
        *self
            .url_lists
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = sources;

        info!(source_count = count, "Successfully loaded external sources");
        Ok(count)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Number of passes started so far
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Copy of the current non-empty source lists
    fn snapshot(&self) -> Vec<IndexerSourceJob> {
        self.url_lists
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|(_, urls)| !urls.is_empty())
            .map(|(source, urls)| IndexerSourceJob {
                source: source.clone(),
                urls: urls.clone(),
            })
            .collect()
    }

    /// Run passes until `shutdown` becomes `true` or its sender is dropped
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Indexer worker started");

        if !*shutdown.borrow() {
            self.run_indexing_once().await;
        }

        let mut ticker = interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let jitter = rand::thread_rng().gen_range(0..MAX_JITTER_MS);
                    sleep(Duration::from_millis(jitter)).await;
                    self.run_indexing_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        warn!(passes = self.passes(), "Indexer worker stopping");
        self.set_state(WorkerState::Stopped);
    }

    /// Run exactly one pass over a snapshot of the configured sources
    pub async fn run_indexing_once(&self) -> PassReport {
        self.set_state(WorkerState::Running);
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();

        let jobs = self.snapshot();
        info!(pass, sources = jobs.len(), "Starting indexing job");

        let handles = jobs.iter().map(|job| {
            let service = self.service.clone();
            let urls = job.urls.clone();
            info!(source = %job.source, url_count = urls.len(), "Indexing source");
            tokio::spawn(async move { service.index_batch(&urls).await })
        });
        let outcomes = join_all(handles).await;

        let mut report = PassReport::default();
        for (job, outcome) in jobs.into_iter().zip(outcomes) {
            let source_report = match outcome {
                Ok((succeeded, failed)) => {
                    info!(source = %job.source, succeeded, failed, "Source indexing done");
                    SourceReport {
                        source: job.source,
                        succeeded,
                        failed,
                        faulted: false,
                    }
                }
                Err(e) => {
                    error!(source = %job.source, error = %e, "Source indexing task faulted");
                    SourceReport {
                        source: job.source,
                        succeeded: 0,
                        failed: job.urls.len(),
                        faulted: true,
                    }
                }
            };
            report.total_succeeded += source_report.succeeded;
            report.total_failed += source_report.failed;
            report.sources.push(source_report);
        }
        report.duration = started.elapsed();

        self.metrics
            .record_indexer_job(report.duration, report.total_succeeded, report.total_failed);
        info!(
            pass,
            total_succeeded = report.total_succeeded,
            total_failed = report.total_failed,
            duration_ms = report.duration.as_millis() as u64,
            "Indexing job completed"
        );

        self.set_state(WorkerState::Idle);
        report
    }
}
