/// Blog entity module
///
/// - Domain: the blog aggregate, its value objects and the repository port
/// - Infrastructure: PostgreSQL and in-memory repositories
/// - Application: the cached service that also schedules media jobs
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{BlogListQuery, BlogService, BlogServiceSettings, BLOG_CACHE_NAMESPACE};
pub use domain::{Blog, BlogChanges, BlogImage, BlogRepository, NewBlog};
pub use infrastructure::{InMemoryBlogRepository, PgBlogRepository};
