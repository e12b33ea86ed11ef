use crate::modules::cache::domain::{namespace_prefix, CacheStore};
use crate::shared::errors::AppResult;
use crate::shared::utils::logger::LogContext;
use std::sync::Arc;

/// Drops every cached entry of a namespace after a successful write
///
/// Readers racing with the invalidation may still see or repopulate the old entry.
#[derive(Clone)]
pub struct CacheInvalidationCoordinator {
    cache: Arc<dyn CacheStore>,
}

impl CacheInvalidationCoordinator {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Scan `<namespace>:` and delete the matches; returns how many keys were removed
    pub async fn invalidate_namespace(&self, namespace: &str) -> AppResult<usize> {
        let prefix = namespace_prefix(namespace);
        let keys = self.cache.keys_matching(&prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let removed = self.cache.delete_many(&keys).await?;
        LogContext::cache_invalidation(namespace, removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::cache::infrastructure::InMemoryCache;
    use std::time::Duration;

    #[tokio::test]
    async fn only_the_namespace_is_cleared() {
        let cache = Arc::new(InMemoryCache::new());
        let ttl = Duration::from_secs(600);
        cache.set("blogs:a", "1", ttl).await.unwrap();
        cache.set("blogs:similar-\"a\"", "2", ttl).await.unwrap();
        cache.set("blogsarchive:a", "3", ttl).await.unwrap();

        let coordinator = CacheInvalidationCoordinator::new(cache.clone());
        let removed = coordinator.invalidate_namespace("blogs").await.unwrap();

        assert_eq!(removed, 2);
        assert!(cache.contains_key("blogsarchive:a"));
    }

    #[tokio::test]
    async fn delete_failure_is_surfaced() {
        let cache = Arc::new(InMemoryCache::new());
        cache.set("blogs:a", "1", Duration::from_secs(60)).await.unwrap();
        cache.fail_deletes(true);

        let coordinator = CacheInvalidationCoordinator::new(cache);
        assert!(coordinator.invalidate_namespace("blogs").await.is_err());
    }
}
