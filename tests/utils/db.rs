/// PostgreSQL test utilities
///
/// Tests that need a real database read TEST_DATABASE_URL; when it is not set
/// they return early so the in-memory suite still runs everywhere.
use blog_media_lib::shared::Database;
use diesel::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

static DATABASE: OnceLock<Option<Arc<Database>>> = OnceLock::new();

/// Global test mutex; the PostgreSQL tests share tables and run serially
static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Shared migrated database, or None when TEST_DATABASE_URL is absent
pub fn test_database() -> Option<Arc<Database>> {
    DATABASE
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let url = std::env::var("TEST_DATABASE_URL").ok()?;
            let database = Database::new(&url).expect("Failed to create test database pool");
            database
                .run_migrations()
                .expect("Failed to run migrations on test database");
            Some(Arc::new(database))
        })
        .clone()
}

/// Clean all test tables - use at the start of each test
pub fn clean_test_db(database: &Database) {
    let mut conn = database
        .get_connection()
        .expect("Failed to get DB connection");

    diesel::sql_query("TRUNCATE TABLE background_jobs, blogs")
        .execute(&mut conn)
        .expect("Failed to clean test tables");
}

/// Acquire test lock to ensure tests run serially
pub fn acquire_test_lock() -> MutexGuard<'static, ()> {
    // Handle poisoned mutex by recovering from panic
    match TEST_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Insert a job row directly, bypassing payload validation
pub fn insert_raw_job(database: &Database, queue_name: &str, task_type: &str, payload: &str) {
    let mut conn = database
        .get_connection()
        .expect("Failed to get DB connection");

    diesel::sql_query(
        "INSERT INTO background_jobs (queue_name, task_type, payload) VALUES ($1, $2, $3::jsonb)",
    )
    .bind::<diesel::sql_types::Text, _>(queue_name)
    .bind::<diesel::sql_types::Text, _>(task_type)
    .bind::<diesel::sql_types::Text, _>(payload)
    .execute(&mut conn)
    .expect("Failed to insert raw job");
}

/// Pretend every active job started `minutes` ago
pub fn backdate_active_jobs(database: &Database, minutes: i32) {
    let mut conn = database
        .get_connection()
        .expect("Failed to get DB connection");

    diesel::sql_query(
        "UPDATE background_jobs
         SET started_at = NOW() - $1 * INTERVAL '1 minute'
         WHERE status = 'active'",
    )
    .bind::<diesel::sql_types::Integer, _>(minutes)
    .execute(&mut conn)
    .expect("Failed to backdate active jobs");
}
