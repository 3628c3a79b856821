// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Fixed-window request counter on top of the cache's incr/expire primitives.
//!
//! The window starts at the first request for an identifier and lasts for the
//! configured length, so a client can get up to `2 * max_requests` through
//! around a window boundary. Store failures fail open.

use crate::models::rate_limit::{RateLimitDecision, RateLimitStatus};
use crate::services::cache::Cache;
use crate::services::logging::anonymize_identifier;
use crate::services::metrics::Metrics;
use chrono::Utc;
use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u64,
    pub window: Duration,
    /// Peers whose `X-Forwarded-For` header is believed
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            trusted_proxies: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
        }
    }
}

impl RateLimitConfig {
    /// Load rate limit configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_requests),
            window: env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.window),
            trusted_proxies: env::var("TRUSTED_PROXIES")
                .map(|raw| parse_trusted_proxies(&raw))
                .unwrap_or(defaults.trusted_proxies),
        }
    }
}

/// Comma-separated IP addresses. Entries that do not parse are skipped.
pub fn parse_trusted_proxies(raw: &str) -> Vec<IpAddr> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!(entry, "Ignoring invalid TRUSTED_PROXIES entry");
                None
            }
        })
        .collect()
}

pub struct RateLimiter {
    cache: Arc<dyn Cache>,
    config: RateLimitConfig,
    metrics: Arc<Metrics>,
}

fn counter_key(identifier: &str) -> String {
    format!("ratelimit:{}", identifier)
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn Cache>, config: RateLimitConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            cache,
            config,
            metrics,
        }
    }

    pub fn limit(&self) -> u64 {
        self.config.max_requests
    }

    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.config.trusted_proxies
    }

    /// Count one request for `identifier` and decide whether it is allowed
    pub async fn check_limit(&self, identifier: &str) -> RateLimitDecision {
        let key = counter_key(identifier);
        let limit = self.config.max_requests;

        let count = match self.cache.incr(&key).await {
            Ok(count) => count.max(0) as u64,
            Err(e) => {
                warn!(error = %e, "Rate limit store unavailable, allowing request");
                return RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit,
                    reset_at: Utc::now() + self.window_chrono(),
                };
            }
        };

        // First request of a new window starts the window
        if count == 1 {
            if let Err(e) = self.cache.expire(&key, self.config.window).await {
                warn!(error = %e, "Failed to set rate limit window expiry");
            }
        }

        let ttl = match self.cache.ttl(&key).await {
            Ok(Some(ttl)) => ttl,
            Ok(None) => self.config.window,
            Err(e) => {
                debug!(error = %e, "Failed to read rate limit TTL");
                self.config.window
            }
        };
        let reset_at = Utc::now() + self.to_chrono(ttl);

        if count > limit {
            self.metrics.record_rate_limit_exceeded("api");
            warn!(
                client = %anonymize_identifier(identifier),
                count,
                limit,
                "Rate limit exceeded"
            );
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at,
            };
        }

        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(count),
            reset_at,
        }
    }

    /// Current counter state for `identifier` without counting a request
    pub async fn get_status(&self, identifier: &str) -> RateLimitStatus {
        let key = counter_key(identifier);
        let limit = self.config.max_requests;

        let requests = match self.cache.get_string(&key).await {
            Ok(Some(raw)) => raw.parse::<u64>().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                debug!(error = %e, "Failed to read rate limit counter");
                0
            }
        };

        let ttl = if requests == 0 {
            self.config.window
        } else {
            self.cache
                .ttl(&key)
                .await
                .ok()
                .flatten()
                .unwrap_or(self.config.window)
        };

        RateLimitStatus {
            requests,
            limit,
            remaining: limit.saturating_sub(requests),
            reset_at: Utc::now() + self.to_chrono(ttl),
        }
    }

    /// Clear the counter for `identifier`, ending its window early
    pub async fn reset(&self, identifier: &str) -> anyhow::Result<()> {
        self.cache.del(&counter_key(identifier)).await?;
        debug!(client = %anonymize_identifier(identifier), "Rate limit reset");
        Ok(())
    }

    fn window_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.window)
            .unwrap_or_else(|_| chrono::Duration::seconds(60))
    }

    fn to_chrono(&self, ttl: Duration) -> chrono::Duration {
        chrono::Duration::from_std(ttl).unwrap_or_else(|_| self.window_chrono())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::{CacheError, CacheResult, MemoryCache};
    use async_trait::async_trait;

    struct UnreachableCache;

    #[async_trait]
    impl Cache for UnreachableCache {
        async fn set_string(&self, _: &str, _: &str, _: Duration) -> CacheResult<()> {
            Err(CacheError::Transport("connection refused".to_string()))
        }
        async fn get_string(&self, _: &str) -> CacheResult<Option<String>> {
            Err(CacheError::Transport("connection refused".to_string()))
        }
        async fn del(&self, _: &str) -> CacheResult<()> {
            Err(CacheError::Transport("connection refused".to_string()))
        }
        async fn exists(&self, _: &str) -> CacheResult<bool> {
            Err(CacheError::Transport("connection refused".to_string()))
        }
        async fn expire(&self, _: &str, _: Duration) -> CacheResult<bool> {
            Err(CacheError::Transport("connection refused".to_string()))
        }
        async fn ttl(&self, _: &str) -> CacheResult<Option<Duration>> {
            Err(CacheError::Transport("connection refused".to_string()))
        }
        async fn incr(&self, _: &str) -> CacheResult<i64> {
            Err(CacheError::Transport("connection refused".to_string()))
        }
    }

    fn limiter(cache: Arc<dyn Cache>, max_requests: u64, window: Duration) -> RateLimiter {
        RateLimiter::new(
            cache,
            RateLimitConfig {
                max_requests,
                window,
                ..Default::default()
            },
            Arc::new(Metrics::new()),
        )
    }

    #[tokio::test]
    async fn test_fourth_request_in_window_is_rejected() {
        let limiter = limiter(Arc::new(MemoryCache::new()), 3, Duration::from_secs(1));

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_limit("ip:10.0.0.1").await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = limiter.check_limit("ip:10.0.0.1").await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(limiter.metrics.rate_limit_exceeded("api"), 1);
    }

    #[tokio::test]
    async fn test_new_window_after_expiry() {
        let limiter = limiter(Arc::new(MemoryCache::new()), 3, Duration::from_secs(1));

        for _ in 0..4 {
            limiter.check_limit("user:alice").await;
        }
        assert!(!limiter.check_limit("user:alice").await.allowed);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let decision = limiter.check_limit("user:alice").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
    }

    #[tokio::test]
    async fn test_identifiers_are_counted_separately() {
        let limiter = limiter(Arc::new(MemoryCache::new()), 1, Duration::from_secs(60));

        assert!(limiter.check_limit("ip:10.0.0.1").await.allowed);
        assert!(!limiter.check_limit("ip:10.0.0.1").await.allowed);
        assert!(limiter.check_limit("ip:10.0.0.2").await.allowed);
    }

    #[tokio::test]
    async fn test_fails_open_when_store_unavailable() {
        let limiter = limiter(Arc::new(UnreachableCache), 1, Duration::from_secs(60));

        for _ in 0..5 {
            let decision = limiter.check_limit("ip:10.0.0.1").await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 1);
        }
    }

    #[tokio::test]
    async fn test_reset_ends_window_early() {
        let limiter = limiter(Arc::new(MemoryCache::new()), 1, Duration::from_secs(60));

        assert!(limiter.check_limit("user:bob").await.allowed);
        assert!(!limiter.check_limit("user:bob").await.allowed);

        limiter.reset("user:bob").await.unwrap();

        assert!(limiter.check_limit("user:bob").await.allowed);
    }

    #[tokio::test]
    async fn test_reset_at_is_within_window() {
        let limiter = limiter(Arc::new(MemoryCache::new()), 5, Duration::from_secs(30));

        let decision = limiter.check_limit("ip:10.0.0.9").await;
        let until_reset = decision.reset_at - Utc::now();
        assert!(until_reset <= chrono::Duration::seconds(30));
        assert!(until_reset > chrono::Duration::seconds(28));
    }

    #[tokio::test]
    async fn test_status_does_not_consume_requests() {
        let limiter = limiter(Arc::new(MemoryCache::new()), 5, Duration::from_secs(60));

        let status = limiter.get_status("ip:10.0.0.3").await;
        assert_eq!(status.requests, 0);
        assert_eq!(status.remaining, 5);

        limiter.check_limit("ip:10.0.0.3").await;
        limiter.check_limit("ip:10.0.0.3").await;

        let status = limiter.get_status("ip:10.0.0.3").await;
        assert_eq!(status.requests, 2);
        assert_eq!(status.remaining, 3);
        assert_eq!(status.limit, 5);
    }

    #[test]
    fn test_parse_trusted_proxies() {
        let proxies = parse_trusted_proxies(" 10.0.0.1, ::1,not-an-ip,,");
        assert_eq!(
            proxies,
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap(),
            ]
        );
    }

    #[test]
    fn test_default_trusts_only_loopback() {
        let config = RateLimitConfig::default();
        assert_eq!(config.trusted_proxies.len(), 2);
        assert!(config.trusted_proxies.iter().all(|ip| ip.is_loopback()));
    }
}
