use crate::modules::cache::domain::CacheStore;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Cached value with its expiry
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries_count: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

/// Process-local cache with TTL, used when no Redis URL is configured
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries_count: self.entries.len(),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map_or(false, |entry| !entry.is_expired())
    }

    /// Simulate an unreachable cache for reads
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Simulate an unreachable cache for deletes
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::CacheError("Simulated read failure".to_string()));
        }

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for key: {}", key);
                return Ok(Some(entry.value.clone()));
            }
        }

        // Expired entries are dropped lazily
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss for key: {}", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        debug!("Cached key: {} with TTL: {:?}", key, ttl);
        Ok(())
    }

    async fn keys_matching(&self, prefix: &str) -> AppResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !entry.is_expired())
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<usize> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::CacheError("Simulated delete failure".to_string()));
        }
        Ok(keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_is_byte_identical() {
        let cache = InMemoryCache::new();
        let value = r#"{"title":"Rutas","emoji":"🏍️"}"#;

        cache.set("blogs:1", value, Duration::from_secs(600)).await.unwrap();

        assert_eq!(cache.get("blogs:1").await.unwrap().as_deref(), Some(value));
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn expired_entries_miss() {
        let cache = InMemoryCache::new();
        cache.set("blogs:1", "x", Duration::ZERO).await.unwrap();

        assert!(cache.get("blogs:1").await.unwrap().is_none());
        assert!(cache.keys_matching("blogs:").await.unwrap().is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn prefix_scan_and_bulk_delete() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("blogs:1", "a", ttl).await.unwrap();
        cache.set("blogs:{}", "b", ttl).await.unwrap();
        cache.set("products:1", "c", ttl).await.unwrap();

        let mut keys = cache.keys_matching("blogs:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["blogs:1".to_string(), "blogs:{}".to_string()]);

        let removed = cache.delete_many(&keys).await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.contains_key("products:1"));
    }
}
