// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Operator-supplied mapping of source name to the URLs to index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalSourcesConfig {
    #[serde(default)]
    pub sources: BTreeMap<String, Vec<String>>,
}

/// One source's batch within an indexing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerSourceJob {
    pub source: String,
    pub urls: Vec<String>,
}

/// Lifecycle of the indexer worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
    Stopped,
}

/// Outcome of one source's batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub succeeded: usize,
    pub failed: usize,
    /// The source task faulted; every URL in its batch is counted as failed
    pub faulted: bool,
}

/// Outcome of one indexing pass across all sources
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub sources: Vec<SourceReport>,
    pub total_succeeded: usize,
    pub total_failed: usize,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl PassReport {
    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|report| report.source == name)
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
