pub mod entities;
pub mod repository;
pub mod value_objects;

pub use entities::{Blog, BlogChanges, BlogImage, BlogView, NewBlog};
pub use repository::{AppendOutcome, BlogCriteria, BlogQuery, BlogRepository};
pub use value_objects::{BlogField, Category, FilterField, Projection, SortField, SortOrder, Subcategory};
