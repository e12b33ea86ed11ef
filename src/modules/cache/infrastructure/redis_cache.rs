use crate::modules::cache::domain::CacheStore;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Keys requested per SCAN round trip
const SCAN_BATCH: usize = 500;

/// Redis-backed cache store
///
/// Built explicitly with `connect` and released with `close`; the multiplexed
/// connection is cloned per command.
pub struct RedisCache {
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| AppError::CacheError(format!("Invalid Redis URL: {}", e)))?;

        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to connect to Redis: {}", e)))?;

        info!("Connected to Redis cache");
        Ok(Self {
            connection: RwLock::new(Some(connection)),
        })
    }

    async fn conn(&self) -> AppResult<MultiplexedConnection> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::CacheError("Redis connection is closed".to_string()))
    }
}

/// Escape glob metacharacters so the prefix is matched literally by SCAN MATCH
fn glob_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn().await?;

        let data: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to get from cache: {}", e)))?;

        debug!(
            "Cache {} for key: {}",
            if data.is_some() { "hit" } else { "miss" },
            key
        );
        Ok(data)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn().await?;

        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to set cache: {}", e)))?;

        Ok(())
    }

    async fn keys_matching(&self, prefix: &str) -> AppResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let pattern = glob_prefix(prefix);

        // Cursor-based SCAN keeps Redis responsive on large keyspaces
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| AppError::CacheError(format!("Failed to list cache keys: {}", e)))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may report a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;

        conn.del::<_, usize>(keys)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to delete from cache: {}", e)))
    }

    async fn close(&self) -> AppResult<()> {
        if self.connection.write().await.take().is_some() {
            info!("Redis cache connection closed");
        }
        Ok(())
    }
}
