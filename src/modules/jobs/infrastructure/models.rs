/// Diesel models for the background_jobs table
use crate::modules::jobs::domain::entities::JobRecord;
use crate::modules::jobs::domain::entities::JobTask;
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::schema::background_jobs;
use crate::shared::errors::AppResult;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Diesel model for inserting new jobs
#[derive(Insertable, Debug)]
#[diesel(table_name = background_jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub queue_name: String,
    pub task_type: String,
    pub payload: JsonValue,
    pub max_attempts: i32,
    pub backoff_ms: i64,
    pub run_at: DateTime<Utc>,
}

/// Diesel model for querying existing jobs
#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = background_jobs)]
pub struct BackgroundJobModel {
    pub id: Uuid,
    pub queue_name: String,
    pub task_type: String,
    pub payload: JsonValue,
    pub status: JobStatusDb,
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_ms: i64,
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl BackgroundJobModel {
    /// Convert to domain JobRecord, decoding the task payload
    pub fn into_job_record(self) -> AppResult<JobRecord> {
        Ok(JobRecord {
            id: self.id,
            queue_name: self.queue_name,
            task: JobTask::from_parts(&self.task_type, self.payload)?,
            status: self.status.into(),
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            backoff_ms: self.backoff_ms,
            run_at: self.run_at,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error,
        })
    }
}

/// Single `status` column returned by state-changing statements
#[derive(QueryableByName, Debug)]
pub struct StatusRow {
    #[diesel(sql_type = crate::schema::sql_types::JobStatus)]
    pub status: JobStatusDb,
}
