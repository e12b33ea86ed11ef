pub mod in_memory;
pub mod models;
pub mod repository;

pub use in_memory::InMemoryBlogRepository;
pub use repository::PgBlogRepository;
