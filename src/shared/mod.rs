// Shared kernel used by every module

pub mod application; // Pagination and response envelope
pub mod config; // Environment configuration
pub mod errors; // Shared error types
pub mod infrastructure; // Database pool and migrations
pub mod utils; // Logging

pub use config::AppConfig;
pub use infrastructure::database::Database;
pub use utils::{init_logger, LogContext, TimedOperation};
