// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! In-process counters for cache, search, indexer and rate-limit activity,
//! rendered in Prometheus text format at `GET /metrics`.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

const CACHE_HITS: &str = "auxstream_cache_hits_total";
const CACHE_MISSES: &str = "auxstream_cache_misses_total";
const SEARCH_REQUESTS: &str = "auxstream_search_requests_total";
const SEARCH_DURATION: &str = "auxstream_search_duration_seconds_sum";
const INDEXER_TRACKS: &str = "auxstream_indexer_tracks_indexed_total";
const INDEXER_JOBS: &str = "auxstream_indexer_jobs_total";
const INDEXER_JOB_DURATION: &str = "auxstream_indexer_job_duration_seconds_sum";
const RATE_LIMIT_EXCEEDED: &str = "auxstream_rate_limit_exceeded_total";

/// Series key: metric name plus sorted label pairs
type SeriesKey = (&'static str, Vec<(&'static str, String)>);

#[derive(Debug, Default)]
pub struct Metrics {
    series: Mutex<BTreeMap<SeriesKey, f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, name: &'static str, labels: &[(&'static str, &str)], value: f64) {
        let key = (
            name,
            labels
                .iter()
                .map(|(label, value)| (*label, value.to_string()))
                .collect(),
        );
        // A poisoned lock only means another recorder panicked mid-update
        let mut series = self
            .series
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *series.entry(key).or_insert(0.0) += value;
    }

    /// Current value of a series, 0 if never recorded
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        let series = self
            .series
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        series
            .iter()
            .find(|((series_name, series_labels), _)| {
                *series_name == name
                    && series_labels.len() == labels.len()
                    && series_labels
                        .iter()
                        .zip(labels)
                        .all(|((k1, v1), (k2, v2))| k1 == k2 && v1 == v2)
            })
            .map(|(_, value)| *value)
            .unwrap_or(0.0)
    }

    pub fn record_cache_hit(&self, cache_type: &str) {
        self.add(CACHE_HITS, &[("cache_type", cache_type)], 1.0);
    }

    pub fn record_cache_miss(&self, cache_type: &str) {
        self.add(CACHE_MISSES, &[("cache_type", cache_type)], 1.0);
    }

    pub fn cache_hits(&self, cache_type: &str) -> u64 {
        self.get(CACHE_HITS, &[("cache_type", cache_type)]) as u64
    }

    pub fn cache_misses(&self, cache_type: &str) -> u64 {
        self.get(CACHE_MISSES, &[("cache_type", cache_type)]) as u64
    }

    pub fn record_search_request(&self, source: &str, status: &str, elapsed: Duration) {
        self.add(
            SEARCH_REQUESTS,
            &[("source", source), ("status", status)],
            1.0,
        );
        self.add(SEARCH_DURATION, &[("source", source)], elapsed.as_secs_f64());
    }

    pub fn record_track_indexed(&self, source: &str, status: &str) {
        self.add(INDEXER_TRACKS, &[("source", source), ("status", status)], 1.0);
    }

    pub fn tracks_indexed(&self, source: &str, status: &str) -> u64 {
        self.get(INDEXER_TRACKS, &[("source", source), ("status", status)]) as u64
    }

    /// Pass-level totals and duration. Per-URL outcomes are recorded by the
    /// indexing service under their own source label; these go under "all".
    pub fn record_indexer_job(&self, elapsed: Duration, succeeded: usize, failed: usize) {
        self.add(INDEXER_JOBS, &[], 1.0);
        self.add(INDEXER_JOB_DURATION, &[], elapsed.as_secs_f64());
        if succeeded > 0 {
            self.add(
                INDEXER_TRACKS,
                &[("source", "all"), ("status", "success")],
                succeeded as f64,
            );
        }
        if failed > 0 {
            self.add(
                INDEXER_TRACKS,
                &[("source", "all"), ("status", "failed")],
                failed as f64,
            );
        }
    }

    pub fn indexer_jobs(&self) -> u64 {
        self.get(INDEXER_JOBS, &[]) as u64
    }

    pub fn record_rate_limit_exceeded(&self, limit_type: &str) {
        self.add(RATE_LIMIT_EXCEEDED, &[("limit_type", limit_type)], 1.0);
    }

    pub fn rate_limit_exceeded(&self, limit_type: &str) -> u64 {
        self.get(RATE_LIMIT_EXCEEDED, &[("limit_type", limit_type)]) as u64
    }

    /// Prometheus text exposition of every recorded series
    pub fn render(&self) -> String {
        let series = self
            .series
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut out = String::new();
        for ((name, labels), value) in series.iter() {
            out.push_str(name);
            if !labels.is_empty() {
                let rendered: Vec<String> = labels
                    .iter()
                    .map(|(label, value)| format!("{}=\"{}\"", label, value.replace('"', "\\\"")))
                    .collect();
                out.push('{');
                out.push_str(&rendered.join(","));
                out.push('}');
            }
            out.push_str(&format!(" {}\n", value));
        }
        out
    }
}
