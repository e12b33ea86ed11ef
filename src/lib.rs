pub mod modules;
mod schema;
pub mod shared;

use modules::blog::{BlogRepository, BlogService, BlogServiceSettings, BLOG_CACHE_NAMESPACE};
use modules::blog::{InMemoryBlogRepository, PgBlogRepository};
use modules::cache::{CacheInvalidationCoordinator, CacheStore, InMemoryCache, RedisCache};
use modules::jobs::{ConsumerRegistry, InMemoryJobQueue, JobQueue, MediaJobProcessor, PgJobQueue};
use modules::media::{HttpObjectStore, InMemoryObjectStore, ObjectStore};
use shared::errors::AppResult;
use shared::{AppConfig, Database};
use std::sync::Arc;

/// Every long-lived component, wired from configuration
///
/// Each backend falls back to its in-memory counterpart when its URL is not
/// configured, so the whole pipeline can run on a laptop.
pub struct AppServices {
    pub blogs: Arc<dyn BlogRepository>,
    pub cache: Arc<dyn CacheStore>,
    pub jobs: Arc<dyn JobQueue>,
    pub object_store: Arc<dyn ObjectStore>,
    pub registry: ConsumerRegistry,
    pub blog_service: Arc<BlogService>,
}

impl AppServices {
    pub async fn build(config: &AppConfig) -> AppResult<Self> {
        let (blogs, jobs): (Arc<dyn BlogRepository>, Arc<dyn JobQueue>) =
            match &config.database_url {
                Some(url) => {
                    let database = Arc::new(Database::new(url)?);
                    database.run_migrations()?;
                    (
                        Arc::new(PgBlogRepository::new(Arc::clone(&database))),
                        Arc::new(PgJobQueue::new(database)),
                    )
                }
                None => {
                    log_warn!("DATABASE_URL not set, blogs and jobs are kept in memory");
                    (
                        Arc::new(InMemoryBlogRepository::new()),
                        Arc::new(InMemoryJobQueue::new()),
                    )
                }
            };

        let cache: Arc<dyn CacheStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisCache::connect(url).await?),
            None => {
                log_warn!("REDIS_URL not set, using the in-process cache");
                Arc::new(InMemoryCache::new())
            }
        };

        let object_store: Arc<dyn ObjectStore> = match &config.object_store {
            Some(store) => Arc::new(HttpObjectStore::new(store)?),
            None => {
                log_warn!("OBJECT_STORE_URL not set, uploads are kept in memory");
                Arc::new(InMemoryObjectStore::new())
            }
        };

        let processor = MediaJobProcessor::new(Arc::clone(&object_store), Arc::clone(&blogs))
            .with_cache_invalidation(
                CacheInvalidationCoordinator::new(Arc::clone(&cache)),
                BLOG_CACHE_NAMESPACE,
            );
        let registry = ConsumerRegistry::new();
        registry.register_consumer(&config.media_queue, Arc::new(processor))?;

        let blog_service = Arc::new(BlogService::new(
            Arc::clone(&blogs),
            Arc::clone(&cache),
            Arc::clone(&jobs),
            BlogServiceSettings::from(config),
        ));

        log_info!("Services ready, media queue is '{}'", config.media_queue);

        Ok(Self {
            blogs,
            cache,
            jobs,
            object_store,
            registry,
            blog_service,
        })
    }
}
