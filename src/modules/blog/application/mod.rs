pub mod dto;
pub mod service;

pub use dto::{BlogListQuery, ValidatedListQuery};
pub use service::{BlogService, BlogServiceSettings, BLOG_CACHE_NAMESPACE, SIMILAR_BLOGS_LIMIT};
