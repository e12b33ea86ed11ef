/// Process configuration read from the environment (and `.env` when present)
use crate::shared::errors::{AppError, AppResult};
use std::env;
use std::time::Duration;

pub const DEFAULT_MEDIA_QUEUE: &str = "cloudinary_blogs";
pub const DEFAULT_MEDIA_FOLDER: &str = "blogs";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL URL; in-memory repository and queue are used when absent
    pub database_url: Option<String>,
    /// Redis URL; in-memory cache is used when absent
    pub redis_url: Option<String>,
    pub object_store: Option<ObjectStoreConfig>,
    pub media_queue: String,
    pub media_folder: String,
    pub cache_ttl: Duration,
    pub worker: WorkerConfig,
    pub job_retention_days: i64,
}

#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub requests_per_second: f64,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
    /// Active jobs older than this are presumed abandoned and reclaimed
    pub stall_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval: Duration::from_millis(1000),
            stall_timeout: Duration::from_secs(300),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            redis_url: None,
            object_store: None,
            media_queue: DEFAULT_MEDIA_QUEUE.to_string(),
            media_folder: DEFAULT_MEDIA_FOLDER.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            worker: WorkerConfig::default(),
            job_retention_days: 7,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let object_store = match non_empty("OBJECT_STORE_URL") {
            Some(base_url) => Some(ObjectStoreConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                token: non_empty("OBJECT_STORE_TOKEN"),
                requests_per_second: parse_or("OBJECT_STORE_RPS", 5.0)?,
            }),
            None => None,
        };

        let concurrency: usize = parse_or("WORKER_CONCURRENCY", defaults.worker.concurrency)?;
        if concurrency == 0 {
            return Err(AppError::InvalidInput(
                "WORKER_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            redis_url: non_empty("REDIS_URL"),
            object_store,
            media_queue: non_empty("MEDIA_QUEUE_NAME").unwrap_or(defaults.media_queue),
            media_folder: non_empty("MEDIA_FOLDER").unwrap_or(defaults.media_folder),
            cache_ttl: Duration::from_secs(parse_or("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?),
            worker: WorkerConfig {
                concurrency,
                poll_interval: Duration::from_millis(parse_or("WORKER_POLL_INTERVAL_MS", 1000u64)?),
                stall_timeout: Duration::from_secs(parse_or(
                    "WORKER_STALL_TIMEOUT_SECS",
                    defaults.worker.stall_timeout.as_secs(),
                )?),
            },
            job_retention_days: parse_or("JOB_RETENTION_DAYS", defaults.job_retention_days)?,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::InvalidInput(format!("{} has an invalid value: {}", key, e))),
        None => Ok(default),
    }
}
