/// Blog entity service
///
/// Reads go through the cache; writes hit the repository first, then enqueue
/// media jobs, then drop the `blogs` cache namespace before responding. Media
/// work itself is never awaited here.
use super::dto::BlogListQuery;
use crate::modules::blog::domain::{Blog, BlogChanges, BlogImage, BlogRepository, BlogView, NewBlog};
use crate::modules::cache::{namespace_key, CacheInvalidationCoordinator, CacheStore};
use crate::modules::jobs::domain::{JobHandle, JobOptions, JobQueue, JobTask};
use crate::modules::media::domain::StagedFile;
use crate::shared::application::{Page, ServiceResponse};
use crate::shared::config::AppConfig;
use crate::shared::errors::AppResult;
use crate::shared::utils::logger::LogContext;
use crate::{log_debug, log_info, log_warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const BLOG_CACHE_NAMESPACE: &str = "blogs";
pub const SIMILAR_BLOGS_LIMIT: i64 = 4;

/// Knobs of the media pipeline as seen by the service
#[derive(Debug, Clone)]
pub struct BlogServiceSettings {
    pub media_queue: String,
    pub media_folder: String,
    pub cache_ttl: Duration,
    pub job_options: JobOptions,
}

impl Default for BlogServiceSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for BlogServiceSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            media_queue: config.media_queue.clone(),
            media_folder: config.media_folder.clone(),
            cache_ttl: config.cache_ttl,
            job_options: JobOptions::media_default(),
        }
    }
}

pub struct BlogService {
    blogs: Arc<dyn BlogRepository>,
    cache: Arc<dyn CacheStore>,
    invalidator: CacheInvalidationCoordinator,
    jobs: Arc<dyn JobQueue>,
    settings: BlogServiceSettings,
}

impl BlogService {
    pub fn new(
        blogs: Arc<dyn BlogRepository>,
        cache: Arc<dyn CacheStore>,
        jobs: Arc<dyn JobQueue>,
        settings: BlogServiceSettings,
    ) -> Self {
        Self {
            blogs,
            invalidator: CacheInvalidationCoordinator::new(Arc::clone(&cache)),
            cache,
            jobs,
            settings,
        }
    }

    pub async fn create_blog(&self, draft: NewBlog) -> AppResult<ServiceResponse<Blog>> {
        draft.validate()?;

        let blog = self.blogs.create(draft).await?;
        self.invalidator
            .invalidate_namespace(BLOG_CACHE_NAMESPACE)
            .await?;

        log_info!("Created blog {}", blog.id);
        Ok(ServiceResponse::ok(blog, "Blog created successfully."))
    }

    pub async fn update_blog(
        &self,
        id: Uuid,
        changes: BlogChanges,
    ) -> AppResult<ServiceResponse<Option<Blog>>> {
        changes.validate()?;

        let Some(blog) = self.blogs.update(id, &changes).await? else {
            return Ok(ServiceResponse::not_found("Blog not found."));
        };
        self.invalidator
            .invalidate_namespace(BLOG_CACHE_NAMESPACE)
            .await?;

        Ok(ServiceResponse::found(blog, "Blog updated successfully."))
    }

    pub async fn list_blogs(
        &self,
        query: BlogListQuery,
    ) -> AppResult<ServiceResponse<Page<BlogView>>> {
        let validated = query.to_query()?;
        let key = namespace_key(BLOG_CACHE_NAMESPACE, &validated.cache_suffix()?);

        if let Some(page) = self.cached::<Page<BlogView>>(&key).await {
            return Ok(ServiceResponse::ok(page, "Blog listing (from cache)."));
        }

        let page = self.blogs.paginate(&validated.query).await?;
        self.remember(&key, &page).await;

        Ok(ServiceResponse::ok(page, "Blog listing."))
    }

    pub async fn show_blog(&self, id: Uuid) -> AppResult<ServiceResponse<Option<Blog>>> {
        let key = namespace_key(BLOG_CACHE_NAMESPACE, &id.to_string());

        if let Some(blog) = self.cached::<Blog>(&key).await {
            return Ok(ServiceResponse::found(blog, "Blog details (from cache)."));
        }

        match self.blogs.find_by_id(id).await? {
            Some(blog) => {
                self.remember(&key, &blog).await;
                Ok(ServiceResponse::found(blog, "Blog details."))
            }
            None => Ok(ServiceResponse::not_found("Blog not found.")),
        }
    }

    /// Delete the blog, then schedule removal of every stored image
    pub async fn delete_blog(&self, id: Uuid) -> AppResult<ServiceResponse<Option<Blog>>> {
        let Some(blog) = self.blogs.delete(id).await? else {
            return Ok(ServiceResponse::not_found("Blog not found."));
        };

        // Every image gets its chance; the first failure is reported afterwards
        let mut enqueued = Ok(());
        for image in &blog.images {
            if let Err(e) = self.enqueue_delete(image).await {
                log_warn!("Failed to schedule removal of {}: {}", image.path, e);
                if enqueued.is_ok() {
                    enqueued = Err(e);
                }
            }
        }

        // The row is gone either way, so the cache must not keep serving it
        self.invalidator
            .invalidate_namespace(BLOG_CACHE_NAMESPACE)
            .await?;
        enqueued?;

        log_info!(
            "Deleted blog {} and scheduled removal of {} image(s)",
            blog.id,
            blog.images.len()
        );
        Ok(ServiceResponse::found(blog, "Blog deleted successfully."))
    }

    /// Schedule removal of one stored image and drop it from the blog
    pub async fn delete_blog_image(
        &self,
        id: Uuid,
        image_id: Uuid,
    ) -> AppResult<ServiceResponse<Option<Vec<BlogImage>>>> {
        let Some(blog) = self.blogs.find_by_id(id).await? else {
            return Ok(ServiceResponse::not_found("Blog not found."));
        };
        let Some(image) = blog.image(image_id) else {
            return Ok(ServiceResponse::not_found("Image not found."));
        };

        self.enqueue_delete(image).await?;

        let Some(updated) = self.blogs.remove_image(id, image_id).await? else {
            return Ok(ServiceResponse::not_found("Blog not found."));
        };
        self.invalidator
            .invalidate_namespace(BLOG_CACHE_NAMESPACE)
            .await?;

        Ok(ServiceResponse::found(
            updated.images,
            "Image deleted successfully.",
        ))
    }

    /// Enqueue one upload job per non-empty batch and return the blog as it is now
    pub async fn upload_files(
        &self,
        id: Uuid,
        mobile: Vec<StagedFile>,
        desktop: Vec<StagedFile>,
    ) -> AppResult<ServiceResponse<Option<Blog>>> {
        let Some(blog) = self.blogs.find_by_id(id).await? else {
            for file in mobile.iter().chain(desktop.iter()) {
                if let Err(e) = file.discard().await {
                    log_debug!("Could not discard staged file {}: {}", file.local_path.display(), e);
                }
            }
            return Ok(ServiceResponse::not_found("Blog not found."));
        };

        for batch in [desktop, mobile] {
            if batch.is_empty() {
                continue;
            }
            let count = batch.len();
            let handle = self
                .enqueue(JobTask::upload_many(blog.id, batch, &self.settings.media_folder))
                .await?;
            log_debug!("Queued upload of {} file(s) for blog {} as job {}", count, blog.id, handle.id);
        }

        Ok(ServiceResponse::found(blog, "Images queued for upload."))
    }

    /// Up to four other blogs of the same category
    pub async fn similar_blogs(&self, id: Uuid) -> AppResult<ServiceResponse<Option<Vec<Blog>>>> {
        let key = namespace_key(BLOG_CACHE_NAMESPACE, &format!("similar-{}", id));

        if let Some(similar) = self.cached::<Vec<Blog>>(&key).await {
            return Ok(ServiceResponse::found(similar, "Similar blogs (from cache)."));
        }

        let Some(blog) = self.blogs.find_by_id(id).await? else {
            return Ok(ServiceResponse::not_found("Blog not found."));
        };
        let similar = self.blogs.find_similar(&blog, SIMILAR_BLOGS_LIMIT).await?;
        self.remember(&key, &similar).await;

        Ok(ServiceResponse::found(similar, "Similar blogs."))
    }

    async fn enqueue_delete(&self, image: &BlogImage) -> AppResult<JobHandle> {
        self.enqueue(JobTask::delete_one(image.path.clone())).await
    }

    async fn enqueue(&self, task: JobTask) -> AppResult<JobHandle> {
        self.jobs
            .enqueue(&self.settings.media_queue, task, self.settings.job_options)
            .await
    }

    /// Cache read; any failure is logged and treated as a miss
    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    LogContext::degraded("Undecodable cache entry", &e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                LogContext::degraded("Cache read failed", &e);
                None
            }
        }
    }

    /// Cache write; a failure only costs the next read a trip to the repository
    async fn remember<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                LogContext::degraded("Cache encode failed", &e);
                return;
            }
        };
        if let Err(e) = self.cache.set(key, &raw, self.settings.cache_ttl).await {
            LogContext::degraded("Cache write failed", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::blog::domain::Category;
    use crate::modules::blog::infrastructure::InMemoryBlogRepository;
    use crate::modules::cache::InMemoryCache;
    use crate::modules::jobs::domain::JobStatus;
    use crate::modules::jobs::InMemoryJobQueue;

    struct Fixture {
        blogs: Arc<InMemoryBlogRepository>,
        cache: Arc<InMemoryCache>,
        jobs: Arc<InMemoryJobQueue>,
        service: BlogService,
    }

    fn fixture() -> Fixture {
        let blogs = Arc::new(InMemoryBlogRepository::new());
        let cache = Arc::new(InMemoryCache::new());
        let jobs = Arc::new(InMemoryJobQueue::new());
        let service = BlogService::new(
            blogs.clone(),
            cache.clone(),
            jobs.clone(),
            BlogServiceSettings::default(),
        );
        Fixture {
            blogs,
            cache,
            jobs,
            service,
        }
    }

    #[tokio::test]
    async fn list_is_served_from_cache_until_a_write() {
        let f = fixture();
        f.service
            .create_blog(NewBlog::new("First", Category::News))
            .await
            .unwrap();

        f.service.list_blogs(BlogListQuery::default()).await.unwrap();
        let cached = f.service.list_blogs(BlogListQuery::default()).await.unwrap();
        assert_eq!(f.blogs.paginate_calls(), 1);
        assert_eq!(cached.data.total_items, 1);

        f.service
            .create_blog(NewBlog::new("Second", Category::News))
            .await
            .unwrap();
        let fresh = f.service.list_blogs(BlogListQuery::default()).await.unwrap();
        assert_eq!(f.blogs.paginate_calls(), 2);
        assert_eq!(fresh.data.total_items, 2);
    }

    #[tokio::test]
    async fn invalid_sort_never_reaches_the_repository() {
        let f = fixture();
        let err = f
            .service
            .list_blogs(BlogListQuery::default().with_sort("price", "asc"))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(f.blogs.paginate_calls(), 0);
    }

    #[tokio::test]
    async fn cache_read_failure_falls_back_to_repository() {
        let f = fixture();
        let blog = f
            .service
            .create_blog(NewBlog::new("A", Category::News))
            .await
            .unwrap()
            .data;

        f.cache.fail_reads(true);
        let shown = f.service.show_blog(blog.id).await.unwrap();
        assert_eq!(shown.data.map(|b| b.id), Some(blog.id));
    }

    #[tokio::test]
    async fn missing_blog_is_not_found_and_not_cached() {
        let f = fixture();
        let id = Uuid::new_v4();

        let response = f.service.show_blog(id).await.unwrap();
        assert!(!response.success);
        assert!(response.data.is_none());
        assert!(!f
            .cache
            .contains_key(&namespace_key(BLOG_CACHE_NAMESPACE, &id.to_string())));
    }

    #[tokio::test]
    async fn deleting_an_image_enqueues_its_removal() {
        let f = fixture();
        let blog = f
            .service
            .create_blog(NewBlog::new("A", Category::News))
            .await
            .unwrap()
            .data;
        f.blogs.append_image(blog.id, "ref-1").await.unwrap();
        f.blogs.append_image(blog.id, "ref-2").await.unwrap();
        let target = f.blogs.find_by_id(blog.id).await.unwrap().unwrap().images[0].clone();

        let response = f
            .service
            .delete_blog_image(blog.id, target.id)
            .await
            .unwrap();
        let remaining = response.data.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].path, "ref-2");

        let jobs = f.jobs.list_jobs("cloudinary_blogs").await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].task, JobTask::delete_one("ref-1"));
        assert_eq!(jobs[0].status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn unknown_image_enqueues_nothing() {
        let f = fixture();
        let blog = f
            .service
            .create_blog(NewBlog::new("A", Category::News))
            .await
            .unwrap()
            .data;

        let response = f
            .service
            .delete_blog_image(blog.id, Uuid::new_v4())
            .await
            .unwrap();
        assert!(response.data.is_none());
        assert!(f.jobs.list_jobs("cloudinary_blogs").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_with_no_changes_is_rejected() {
        let f = fixture();
        let blog = f
            .service
            .create_blog(NewBlog::new("A", Category::News))
            .await
            .unwrap()
            .data;

        let err = f
            .service
            .update_blog(blog.id, BlogChanges::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
