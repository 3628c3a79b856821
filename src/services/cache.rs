// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Key-value result cache with TTLs.
//!
//! `Cache` is the contract every other service is written against. Callers
//! treat every `CacheError` as soft: log it and carry on as if the cache were
//! empty. `MemoryCache` is the bounded in-process store used by the agent
//! binary and the tests.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use lru::LruCache;
use std::env;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache transport error: {0}")]
    Transport(String),
    #[error("value at '{key}' is not an integer")]
    NotAnInteger { key: String },
    #[error("failed to encode or decode cached value: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// String-valued cache store with per-key expiry.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Store `value` under `key`. A zero `ttl` stores without expiry.
    async fn set_string(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// `Ok(None)` when the key does not exist or has expired
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    async fn del(&self, key: &str) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Set the expiry of an existing key. Returns false when the key is missing.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remaining time to live. `None` when the key is missing or never expires.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Atomically increment the integer at `key` and return the new value.
    /// A missing key starts at 0 and gets no expiry; an existing key keeps its expiry.
    async fn incr(&self, key: &str) -> CacheResult<i64>;
}

/// JSON encode `value` and store it
pub async fn set_json<C, T>(cache: &C, key: &str, value: &T, ttl: Duration) -> CacheResult<()>
where
    C: Cache + ?Sized,
    T: Serialize + ?Sized,
{
    let encoded = serde_json::to_string(value)?;
    cache.set_string(key, &encoded, ttl).await
}

/// Load and JSON decode the value at `key`
pub async fn get_json<C, T>(cache: &C, key: &str) -> CacheResult<Option<T>>
where
    C: Cache + ?Sized,
    T: DeserializeOwned,
{
    match cache.get_string(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Default bound on the number of keys held by a [`MemoryCache`]
pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;
/// Writes between full sweeps of expired entries
const SWEEP_EVERY_WRITES: u64 = 1024;

struct Store {
    entries: LruCache<String, Entry>,
    writes_since_sweep: u64,
}

impl Store {
    /// Look up a live entry, evicting it if it has expired
    fn live_entry(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        if self
            .entries
            .peek(key)
            .is_some_and(|entry| !entry.is_live(now))
        {
            self.entries.pop(key);
        }
        self.entries.get_mut(key)
    }

    fn insert(&mut self, key: &str, entry: Entry, now: Instant) {
        self.writes_since_sweep += 1;
        if self.writes_since_sweep >= SWEEP_EVERY_WRITES {
            self.sweep(now);
        }
        self.entries.put(key.to_string(), entry);
    }

    fn sweep(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
        self.writes_since_sweep = 0;
        expired.len()
    }
}

/// In-process cache store bounded to a fixed number of keys.
///
/// The least recently used key is evicted when the store is full. Expired
/// entries are dropped when read and by a sweep every few writes.
pub struct MemoryCache {
    store: Mutex<Store>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Mutex::new(Store {
                entries: LruCache::new(capacity),
                writes_since_sweep: 0,
            }),
        }
    }

    /// Capacity from `CACHE_MAX_ENTRIES`, falling back to [`DEFAULT_CACHE_CAPACITY`]
    pub fn from_env() -> Self {
        let capacity = env::var("CACHE_MAX_ENTRIES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CACHE_CAPACITY);
        Self::with_capacity(capacity)
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| CacheError::Transport("memory cache lock poisoned".to_string()))
    }

    /// Number of keys held, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.lock().map(|store| store.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> CacheResult<usize> {
        Ok(self.lock()?.sweep(Instant::now()))
    }
}

fn expiry_from(now: Instant, ttl: Duration) -> Option<Instant> {
    if ttl.is_zero() {
        None
    } else {
        Some(now + ttl)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set_string(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let entry = Entry {
            value: value.to_string(),
            expires_at: expiry_from(now, ttl),
        };
        self.lock()?.insert(key, entry, now);
        Ok(())
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut store = self.lock()?;
        Ok(store
            .live_entry(key, Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.lock()?.entries.pop(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut store = self.lock()?;
        Ok(store.live_entry(key, Instant::now()).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let now = Instant::now();
        let mut store = self.lock()?;
        match store.live_entry(key, now) {
            Some(entry) => {
                entry.expires_at = expiry_from(now, ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let now = Instant::now();
        let mut store = self.lock()?;
        Ok(store
            .live_entry(key, now)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let now = Instant::now();
        let mut store = self.lock()?;
        if let Some(entry) = store.live_entry(key, now) {
            let current: i64 = entry.value.parse().map_err(|_| CacheError::NotAnInteger {
                key: key.to_string(),
            })?;
            let next = current + 1;
            entry.value = next.to_string();
            return Ok(next);
        }

        let entry = Entry {
            value: "1".to_string(),
            expires_at: None,
        };
        store.insert(key, entry, now);
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Artist {
        name: String,
        id: u32,
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get_string("artist-1").await.unwrap(), None);
        assert!(!cache.exists("artist-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_and_get_json() {
        let cache = MemoryCache::new();
        let artist = Artist {
            name: "Test".to_string(),
            id: 1,
        };

        set_json(&cache, "artist-1", &artist, Duration::from_secs(60))
            .await
            .unwrap();
        let loaded: Option<Artist> = get_json(&cache, "artist-1").await.unwrap();

        assert_eq!(loaded, Some(artist));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set_string("short", "value", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(cache.exists("short").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!cache.exists("short").await.unwrap());
        assert_eq!(cache.get_string("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_key() {
        let cache = MemoryCache::new();
        cache
            .set_string("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        cache.del("k").await.unwrap();
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_reports_remaining_time() {
        let cache = MemoryCache::new();
        cache
            .set_string("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        let ttl = cache.ttl("k").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(60));
        assert!(ttl > Duration::from_secs(58));

        cache.set_string("forever", "v", Duration::ZERO).await.unwrap();
        assert_eq!(cache.ttl("forever").await.unwrap(), None);
        assert_eq!(cache.ttl("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_counts_and_preserves_expiry() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr("counter").await.unwrap(), 1);
        assert_eq!(cache.ttl("counter").await.unwrap(), None);

        assert!(cache
            .expire("counter", Duration::from_secs(30))
            .await
            .unwrap());
        assert_eq!(cache.incr("counter").await.unwrap(), 2);
        assert_eq!(cache.incr("counter").await.unwrap(), 3);
        assert!(cache.ttl("counter").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let cache = MemoryCache::new();
        cache
            .set_string("text", "hello", Duration::ZERO)
            .await
            .unwrap();
        let err = cache.incr("text").await.unwrap_err();
        assert!(matches!(err, CacheError::NotAnInteger { .. }));
    }

    #[tokio::test]
    async fn test_expire_missing_key_returns_false() {
        let cache = MemoryCache::new();
        assert!(!cache
            .expire("missing", Duration::from_secs(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = MemoryCache::with_capacity(3);
        for key in ["a", "b", "c"] {
            cache.set_string(key, "v", Duration::ZERO).await.unwrap();
        }
        // Touch "a" so "b" becomes the oldest
        cache.get_string("a").await.unwrap();
        cache.set_string("d", "v", Duration::ZERO).await.unwrap();

        assert_eq!(cache.len(), 3);
        assert!(cache.exists("a").await.unwrap());
        assert!(!cache.exists("b").await.unwrap());
        assert!(cache.exists("d").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entries_are_reclaimed_without_reads() {
        let cache = MemoryCache::with_capacity(20_000);
        for i in 0..10_000 {
            let key = format!("search:all:q{}:20", i);
            cache
                .set_string(&key, "[]", Duration::from_millis(1))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Enough writes to trigger a sweep
        for i in 0..SWEEP_EVERY_WRITES {
            let key = format!("fresh:{}", i);
            cache
                .set_string(&key, "v", Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert_eq!(cache.len(), SWEEP_EVERY_WRITES as usize);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache
            .set_string("short", "v", Duration::from_millis(1))
            .await
            .unwrap();
        cache.set_string("kept", "v", Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_store_never_exceeds_capacity() {
        let cache = MemoryCache::with_capacity(100);
        for i in 0..10_000 {
            let key = format!("ratelimit:ip:10.0.{}.{}", i / 256, i % 256);
            cache.incr(&key).await.unwrap();
        }
        assert_eq!(cache.len(), 100);
    }
}
