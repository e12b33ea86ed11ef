/// Shared infrastructure concerns
///
/// Infrastructure used by more than one module (database pool, migrations).
pub mod database;

pub use database::{Database, DbConnection, DbPool};
