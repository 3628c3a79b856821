// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single rate-limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, never negative
    pub fn retry_after_secs(&self) -> u64 {
        (self.reset_at - Utc::now()).num_seconds().max(0) as u64
    }
}

/// Current counter state for an identifier, without consuming a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub requests: u64,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Body returned with 429 responses
#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitExceededResponse {
    pub error: String,
    pub retry_after: u64,
}
