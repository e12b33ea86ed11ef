pub mod blog;
pub mod cache;
pub mod jobs;
pub mod media;
