pub mod in_memory_cache;
pub mod redis_cache;

pub use in_memory_cache::{CacheStats, InMemoryCache};
pub use redis_cache::RedisCache;
