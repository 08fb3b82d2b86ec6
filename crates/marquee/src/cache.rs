//! Edge cache for assembled, post-injection responses.
//!
//! Entries are keyed by the full request URL with no normalization, so two
//! URLs differing only in query order occupy two entries. Entries expire by
//! TTL only; nothing invalidates them explicitly.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use http::{HeaderMap, StatusCode};
use moka::future::Cache;

use crate::config::CacheSettings;
use crate::error::MarqueeResult;

/// A fully assembled response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Response status.
    pub status: StatusCode,
    /// Response headers, including the recomputed `Content-Length`.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
    /// When this entry was cached.
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            cached_at: Utc::now(),
        }
    }
}

/// Key-value store of assembled responses.
///
/// Implementations must be safe to share between requests. A lookup error
/// is treated by callers as a miss, and a store error is discarded.
pub trait EdgeCache: Send + Sync + 'static {
    /// Returns the backend name for logs.
    fn name(&self) -> &'static str;

    /// Look up a previously stored response.
    fn lookup<'a>(&'a self, key: &'a str) -> BoxFuture<'a, MarqueeResult<Option<CacheEntry>>>;

    /// Store an assembled response.
    fn store<'a>(&'a self, key: String, entry: CacheEntry) -> BoxFuture<'a, MarqueeResult<()>>;
}

/// Shared handle to a cache backend.
pub type SharedCache = Arc<dyn EdgeCache>;

/// Build the cache backend described by the `[cache]` section.
pub fn from_settings(settings: &CacheSettings) -> SharedCache {
    if settings.enabled {
        Arc::new(MemoryCache::new(settings.max_capacity, settings.ttl))
    } else {
        Arc::new(DisabledCache)
    }
}

/// In-process cache with a time-to-live and an entry ceiling.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Cache<String, CacheEntry>,
}

impl MemoryCache {
    /// Create a cache holding at most `max_capacity` entries for `ttl` each.
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Approximate number of live entries.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl EdgeCache for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn lookup<'a>(&'a self, key: &'a str) -> BoxFuture<'a, MarqueeResult<Option<CacheEntry>>> {
        Box::pin(async move { Ok(self.inner.get(key).await) })
    }

    fn store<'a>(&'a self, key: String, entry: CacheEntry) -> BoxFuture<'a, MarqueeResult<()>> {
        Box::pin(async move {
            self.inner.insert(key, entry).await;
            Ok(())
        })
    }
}

/// A cache that never holds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

impl EdgeCache for DisabledCache {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn lookup<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, MarqueeResult<Option<CacheEntry>>> {
        Box::pin(async { Ok(None) })
    }

    fn store<'a>(&'a self, _key: String, _entry: CacheEntry) -> BoxFuture<'a, MarqueeResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;

    fn entry(body: &'static str) -> CacheEntry {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "text/html".parse().unwrap());
        CacheEntry::new(StatusCode::OK, headers, Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        assert!(cache.lookup("https://a/x").await.unwrap().is_none());

        cache.store("https://a/x".to_string(), entry("<p>x</p>")).await.unwrap();

        let hit = cache.lookup("https://a/x").await.unwrap().unwrap();
        assert_eq!(hit.status, StatusCode::OK);
        assert_eq!(hit.body, Bytes::from_static(b"<p>x</p>"));
        assert_eq!(hit.headers.get(CONTENT_TYPE).unwrap(), "text/html");
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_keys_are_not_normalized() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        cache.store("https://a/?x=1&y=2".to_string(), entry("one")).await.unwrap();

        assert!(cache.lookup("https://a/?y=2&x=1").await.unwrap().is_none());
        assert!(cache.lookup("https://a/?x=1&y=2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new(100, Duration::from_millis(50));
        cache.store("k".to_string(), entry("v")).await.unwrap();
        assert!(cache.lookup("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.lookup("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let cache = DisabledCache;
        cache.store("k".to_string(), entry("v")).await.unwrap();
        assert!(cache.lookup("k").await.unwrap().is_none());
        assert_eq!(cache.name(), "disabled");
    }

    #[test]
    fn test_from_settings() {
        let settings = CacheSettings::default();
        assert_eq!(from_settings(&settings).name(), "memory");

        let settings = CacheSettings {
            enabled: false,
            ..CacheSettings::default()
        };
        assert_eq!(from_settings(&settings).name(), "disabled");
    }
}
