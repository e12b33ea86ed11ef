/// In-memory blog repository for tests and local runs without PostgreSQL
///
/// Each blog sits behind its DashMap shard lock, which makes `append_image`
/// atomic per entry just like the conditional UPDATE of the SQL repository.
use crate::modules::blog::domain::{
    AppendOutcome, Blog, BlogChanges, BlogImage, BlogQuery, BlogRepository, BlogView, NewBlog,
    SortField, SortOrder,
};
use crate::shared::application::Page;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryBlogRepository {
    blogs: DashMap<Uuid, Blog>,
    paginate_calls: AtomicUsize,
    find_calls: AtomicUsize,
    fail_writes: AtomicBool,
}

impl InMemoryBlogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `paginate` queries executed
    pub fn paginate_calls(&self) -> usize {
        self.paginate_calls.load(Ordering::SeqCst)
    }

    /// Number of `find_by_id` lookups executed
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail with a database error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blogs.is_empty()
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(
                "Simulated write failure".to_string(),
            ));
        }
        Ok(())
    }

    fn compare(a: &Blog, b: &Blog, field: SortField, order: SortOrder) -> CmpOrdering {
        let by_field = match field {
            SortField::Title => a.title.cmp(&b.title),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let by_field = match order {
            SortOrder::Asc => by_field,
            SortOrder::Desc => by_field.reverse(),
        };
        by_field.then_with(|| a.id.cmp(&b.id))
    }
}

#[async_trait]
impl BlogRepository for InMemoryBlogRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Blog>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.blogs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, draft: NewBlog) -> AppResult<Blog> {
        self.check_writable()?;
        let blog = Blog::new(draft, Utc::now());
        self.blogs.insert(blog.id, blog.clone());
        Ok(blog)
    }

    async fn update(&self, id: Uuid, changes: &BlogChanges) -> AppResult<Option<Blog>> {
        self.check_writable()?;
        Ok(self.blogs.get_mut(&id).map(|mut entry| {
            changes.apply_to(entry.value_mut(), Utc::now());
            entry.value().clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<Blog>> {
        self.check_writable()?;
        Ok(self.blogs.remove(&id).map(|(_, blog)| blog))
    }

    async fn paginate(&self, query: &BlogQuery) -> AppResult<Page<BlogView>> {
        self.paginate_calls.fetch_add(1, Ordering::SeqCst);
        let matcher = query.criteria.matcher()?;

        let mut matching: Vec<Blog> = self
            .blogs
            .iter()
            .filter(|entry| matcher.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| Self::compare(a, b, query.sort_field, query.sort_order));

        let total = matching.len() as u64;
        let data = matching
            .iter()
            .skip(query.skip.max(0) as usize)
            .take(query.per_page.max(0) as usize)
            .map(|blog| blog.project(&query.projection))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Page::new(data, total, query.per_page))
    }

    async fn append_image(&self, id: Uuid, path: &str) -> AppResult<AppendOutcome> {
        self.check_writable()?;
        let Some(mut entry) = self.blogs.get_mut(&id) else {
            return Ok(AppendOutcome::BlogMissing);
        };

        let blog = entry.value_mut();
        if blog.has_image_path(path) {
            return Ok(AppendOutcome::AlreadyPresent);
        }

        let image = BlogImage::new(path);
        blog.images.push(image.clone());
        blog.updated_at = Utc::now();
        Ok(AppendOutcome::Appended(image))
    }

    async fn remove_image(&self, id: Uuid, image_id: Uuid) -> AppResult<Option<Blog>> {
        self.check_writable()?;
        Ok(self.blogs.get_mut(&id).map(|mut entry| {
            let blog = entry.value_mut();
            blog.images.retain(|image| image.id != image_id);
            blog.updated_at = Utc::now();
            blog.clone()
        }))
    }

    async fn find_similar(&self, blog: &Blog, limit: i64) -> AppResult<Vec<Blog>> {
        let mut similar: Vec<Blog> = self
            .blogs
            .iter()
            .filter(|entry| entry.category == blog.category && entry.id != blog.id)
            .map(|entry| entry.value().clone())
            .collect();
        similar.sort_by(|a, b| Self::compare(a, b, SortField::CreatedAt, SortOrder::Desc));
        similar.truncate(limit.max(0) as usize);
        Ok(similar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::blog::domain::{BlogCriteria, Category, FilterField, Projection};

    fn query(criteria: BlogCriteria, sort_order: SortOrder) -> BlogQuery {
        BlogQuery {
            criteria,
            skip: 0,
            per_page: 7,
            sort_field: SortField::Title,
            sort_order,
            projection: Projection::all(),
        }
    }

    #[tokio::test]
    async fn append_is_deduplicated_by_path() {
        let repo = InMemoryBlogRepository::new();
        let blog = repo.create(NewBlog::new("A", Category::News)).await.unwrap();

        let first = repo.append_image(blog.id, "memory://blogs/1").await.unwrap();
        let second = repo.append_image(blog.id, "memory://blogs/1").await.unwrap();

        assert!(matches!(first, AppendOutcome::Appended(_)));
        assert_eq!(second, AppendOutcome::AlreadyPresent);
        assert_eq!(repo.find_by_id(blog.id).await.unwrap().unwrap().images.len(), 1);
    }

    #[tokio::test]
    async fn append_to_missing_blog_reports_it() {
        let repo = InMemoryBlogRepository::new();
        let outcome = repo.append_image(Uuid::new_v4(), "memory://x").await.unwrap();
        assert_eq!(outcome, AppendOutcome::BlogMissing);
    }

    #[tokio::test]
    async fn paginate_sorts_and_counts() {
        let repo = InMemoryBlogRepository::new();
        for title in ["b", "a", "c"] {
            repo.create(NewBlog::new(title, Category::News)).await.unwrap();
        }
        repo.create(NewBlog::new("z", Category::Community)).await.unwrap();

        let criteria =
            BlogCriteria::new(None, vec![(FilterField::Category, "Noticias".to_string())])
                .unwrap();
        let page = repo.paginate(&query(criteria, SortOrder::Asc)).await.unwrap();

        let titles: Vec<_> = page.data.iter().map(|view| view["title"].clone()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert_eq!(page.total_items, 3);
        assert_eq!(page.total_pages, 1);
        assert_eq!(repo.paginate_calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let repo = std::sync::Arc::new(InMemoryBlogRepository::new());
        let blog = repo.create(NewBlog::new("A", Category::News)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = std::sync::Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.append_image(blog.id, &format!("memory://blogs/{}", i))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repo.find_by_id(blog.id).await.unwrap().unwrap().images.len(), 16);
    }

    #[tokio::test]
    async fn similar_excludes_self_and_other_categories() {
        let repo = InMemoryBlogRepository::new();
        let blog = repo.create(NewBlog::new("A", Category::News)).await.unwrap();
        for title in ["B", "C", "D", "E", "F"] {
            repo.create(NewBlog::new(title, Category::News)).await.unwrap();
        }
        repo.create(NewBlog::new("G", Category::Lifestyle)).await.unwrap();

        let similar = repo.find_similar(&blog, 4).await.unwrap();
        assert_eq!(similar.len(), 4);
        assert!(similar
            .iter()
            .all(|other| other.id != blog.id && other.category == Category::News));
    }
}
