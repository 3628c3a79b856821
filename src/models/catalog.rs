// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Track stored in the local catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub artist_name: String,
    /// Duration in seconds
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub thumbnail: String,
    /// Stored audio file name, served under `/api/v1/serve/`
    pub file: String,
}

impl CatalogTrack {
    pub fn stream_url(&self) -> String {
        format!("/api/v1/serve/{}", self.file)
    }
}
