/// Port for the key/value cache sitting in front of the record store
///
/// Values are opaque serialized strings; a `get` after `set` returns exactly the
/// stored bytes until the TTL elapses or the key is deleted.
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Every live key starting with `prefix`
    async fn keys_matching(&self, prefix: &str) -> AppResult<Vec<String>>;

    /// Returns how many keys were actually removed
    async fn delete_many(&self, keys: &[String]) -> AppResult<usize>;

    /// Release the underlying connection; later calls fail
    async fn close(&self) -> AppResult<()> {
        Ok(())
    }
}
