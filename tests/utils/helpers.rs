/// Test helper functions and service builders
use blog_media_lib::modules::blog::{BlogService, BlogServiceSettings, InMemoryBlogRepository, BLOG_CACHE_NAMESPACE};
use blog_media_lib::modules::cache::{CacheInvalidationCoordinator, InMemoryCache};
use blog_media_lib::modules::jobs::{
    BackgroundWorker, ConsumerRegistry, InMemoryJobQueue, JobEvent, JobEventBus, MediaJobProcessor,
};
use blog_media_lib::modules::media::InMemoryObjectStore;
use blog_media_lib::shared::config::{AppConfig, WorkerConfig};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub const MEDIA_QUEUE: &str = "cloudinary_blogs";

/// Clock that only moves when told to
#[derive(Clone)]
pub struct ManualClock {
    start: DateTime<Utc>,
    offset_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Utc::now(),
            offset_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.start + Duration::milliseconds(self.offset_ms.load(Ordering::SeqCst))
    }

    pub fn advance_ms(&self, ms: i64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

pub struct TestServices {
    pub blogs: Arc<InMemoryBlogRepository>,
    pub cache: Arc<InMemoryCache>,
    pub jobs: Arc<InMemoryJobQueue>,
    pub object_store: Arc<InMemoryObjectStore>,
    pub clock: ManualClock,
    pub events: JobEventBus,
    pub blog_service: BlogService,
    pub worker: Arc<BackgroundWorker>,
}

/// Build the whole pipeline on in-memory backends with a manual clock
pub fn build_test_services() -> TestServices {
    let clock = ManualClock::new();
    let queue_clock = clock.clone();

    let blogs = Arc::new(InMemoryBlogRepository::new());
    let cache = Arc::new(InMemoryCache::new());
    let jobs = Arc::new(InMemoryJobQueue::with_clock(Arc::new(move || queue_clock.now())));
    let object_store = Arc::new(InMemoryObjectStore::new());
    let events = JobEventBus::new();

    let processor = MediaJobProcessor::new(object_store.clone(), blogs.clone())
        .with_cache_invalidation(
            CacheInvalidationCoordinator::new(cache.clone()),
            BLOG_CACHE_NAMESPACE,
        );
    let registry = ConsumerRegistry::new();
    registry
        .register_consumer(MEDIA_QUEUE, Arc::new(processor))
        .unwrap();

    let worker = Arc::new(
        BackgroundWorker::new(
            jobs.clone(),
            &registry,
            MEDIA_QUEUE,
            events.clone(),
            WorkerConfig {
                concurrency: 1,
                poll_interval: std::time::Duration::from_millis(10),
                ..WorkerConfig::default()
            },
        )
        .unwrap(),
    );

    let blog_service = BlogService::new(
        blogs.clone(),
        cache.clone(),
        jobs.clone(),
        BlogServiceSettings::from(&AppConfig::default()),
    );

    TestServices {
        blogs,
        cache,
        jobs,
        object_store,
        clock,
        events,
        blog_service,
        worker,
    }
}

/// Process runnable jobs inline until the queue has nothing due
pub async fn drain_queue(worker: &BackgroundWorker) -> usize {
    let mut processed = 0;
    while worker.process_next_job().await.unwrap() {
        processed += 1;
    }
    processed
}

/// Collect every event already published on `receiver`
pub fn collect_events(receiver: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
