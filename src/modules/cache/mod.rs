/// Read-through cache layer
///
/// - Domain: `CacheStore` port and namespace key helpers
/// - Infrastructure: Redis and in-memory stores
/// - Coordinator: namespace invalidation after writes
pub mod coordinator;
pub mod domain;
pub mod infrastructure;

pub use coordinator::CacheInvalidationCoordinator;
pub use domain::{namespace_key, namespace_prefix, CacheStore};
pub use infrastructure::{CacheStats, InMemoryCache, RedisCache};
