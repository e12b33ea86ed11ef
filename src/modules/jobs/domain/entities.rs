/// Domain entities for the media job queue
///
/// A job is a closed task variant plus its retry budget. `JobRecord` carries the
/// broker-side state machine:
///
/// `Queued -> Active -> Completed`
/// `Queued -> Active -> Queued (retry after backoff) -> ... -> Failed`
use crate::modules::media::domain::StagedFile;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Job status as seen by the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Active => write!(f, "active"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "active" => Ok(JobStatus::Active),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Task discriminant, stored next to the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    UploadMany,
    DeleteOne,
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::UploadMany => write!(f, "upload_many"),
            JobType::DeleteOne => write!(f, "delete_one"),
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upload_many" => Ok(JobType::UploadMany),
            "delete_one" => Ok(JobType::DeleteOne),
            _ => Err(format!("Invalid job type: {}", s)),
        }
    }
}

/// Entity field that receives uploaded references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageField {
    Images,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadManyPayload {
    pub entity_ref: Uuid,
    pub files: Vec<StagedFile>,
    pub destination_folder: String,
    pub target_field: ImageField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteOnePayload {
    pub object_ref: String,
}

/// Closed set of media tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", content = "payload", rename_all = "snake_case")]
pub enum JobTask {
    UploadMany(UploadManyPayload),
    DeleteOne(DeleteOnePayload),
}

impl JobTask {
    pub fn upload_many(entity_ref: Uuid, files: Vec<StagedFile>, destination_folder: &str) -> Self {
        JobTask::UploadMany(UploadManyPayload {
            entity_ref,
            files,
            destination_folder: destination_folder.to_string(),
            target_field: ImageField::Images,
        })
    }

    pub fn delete_one(object_ref: impl Into<String>) -> Self {
        JobTask::DeleteOne(DeleteOnePayload {
            object_ref: object_ref.into(),
        })
    }

    pub fn job_type(&self) -> JobType {
        match self {
            JobTask::UploadMany(_) => JobType::UploadMany,
            JobTask::DeleteOne(_) => JobType::DeleteOne,
        }
    }

    /// Reject payloads that must never reach the queue
    pub fn validate(&self) -> AppResult<()> {
        match self {
            JobTask::UploadMany(payload) if payload.files.is_empty() => Err(
                AppError::ValidationError("Upload batch must contain at least one file".to_string()),
            ),
            JobTask::DeleteOne(payload) if payload.object_ref.trim().is_empty() => Err(
                AppError::ValidationError("Object reference must not be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Payload alone, for storage next to `job_type`
    pub fn payload_json(&self) -> AppResult<serde_json::Value> {
        let value = match self {
            JobTask::UploadMany(payload) => serde_json::to_value(payload)?,
            JobTask::DeleteOne(payload) => serde_json::to_value(payload)?,
        };
        Ok(value)
    }

    /// Rebuild a task from its stored discriminant and payload
    pub fn from_parts(job_type: &str, payload: serde_json::Value) -> AppResult<Self> {
        let job_type: JobType = job_type.parse().map_err(AppError::SerializationError)?;
        let task = match job_type {
            JobType::UploadMany => JobTask::UploadMany(serde_json::from_value(payload)?),
            JobType::DeleteOne => JobTask::DeleteOne(serde_json::from_value(payload)?),
        };
        Ok(task)
    }
}

/// Retry budget attached at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub attempts_allowed: u32,
    pub backoff: Duration,
}

impl JobOptions {
    pub const fn new(attempts_allowed: u32, backoff: Duration) -> Self {
        Self {
            attempts_allowed,
            backoff,
        }
    }

    /// Policy used for every media task: 3 attempts, fixed 5 s between them
    pub const fn media_default() -> Self {
        Self::new(3, Duration::from_millis(5000))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.attempts_allowed == 0 {
            return Err(AppError::ValidationError(
                "A job must allow at least one attempt".to_string(),
            ));
        }
        if i32::try_from(self.attempts_allowed).is_err()
            || i64::try_from(self.backoff.as_millis()).is_err()
        {
            return Err(AppError::ValidationError(
                "Job retry options are out of range".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::media_default()
    }
}

/// Returned by `enqueue`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: Uuid,
    pub queue_name: String,
}

/// Error recorded on a job whose attempt never reported an outcome
pub const STALLED_JOB_ERROR: &str = "Job stalled: its attempt never reported an outcome";

/// Job as tracked by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub queue_name: String,
    pub task: JobTask,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_ms: i64,
    /// Earliest instant the job may be picked up
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn new(queue_name: &str, task: JobTask, options: JobOptions, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue_name: queue_name.to_string(),
            task,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts: options.attempts_allowed as i32,
            backoff_ms: options.backoff.as_millis() as i64,
            run_at: now,
            created_at: now,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id,
            queue_name: self.queue_name.clone(),
        }
    }

    pub fn job_type(&self) -> JobType {
        self.task.job_type()
    }

    /// Check if job can be retried
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// True once the job has already been attempted before the current run
    pub fn is_retry(&self) -> bool {
        self.attempts > 1
    }

    pub fn is_runnable(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Queued && self.run_at <= now
    }

    /// Queued -> Active, consuming one attempt
    pub fn start_attempt(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        if !self.is_runnable(now) {
            return Err(self.invalid_transition("start"));
        }
        self.status = JobStatus::Active;
        self.attempts += 1;
        self.started_at = Some(now);
        Ok(())
    }

    /// Active -> Completed
    pub fn complete(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        if self.status != JobStatus::Active {
            return Err(self.invalid_transition("complete"));
        }
        self.status = JobStatus::Completed;
        self.finished_at = Some(now);
        self.error = None;
        Ok(())
    }

    /// Active -> Queued (retry after the fixed backoff) or Failed once the budget is spent
    pub fn fail(&mut self, error: &str, now: DateTime<Utc>) -> AppResult<JobStatus> {
        if self.status != JobStatus::Active {
            return Err(self.invalid_transition("fail"));
        }
        self.error = Some(error.to_string());
        self.started_at = None;

        if self.can_retry() {
            self.status = JobStatus::Queued;
            self.run_at = now + chrono::Duration::milliseconds(self.backoff_ms);
        } else {
            self.status = JobStatus::Failed;
            self.finished_at = Some(now);
        }
        Ok(self.status)
    }

    /// True when the current attempt started before `cutoff` and never reported back
    pub fn is_stalled(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == JobStatus::Active && self.started_at.map_or(false, |at| at < cutoff)
    }

    /// Active -> Queued (runnable immediately) or Failed when the stalled attempt was the last
    pub fn reclaim(&mut self, now: DateTime<Utc>) -> AppResult<JobStatus> {
        if self.status != JobStatus::Active {
            return Err(self.invalid_transition("reclaim"));
        }
        self.error = Some(STALLED_JOB_ERROR.to_string());
        self.started_at = None;

        if self.can_retry() {
            self.status = JobStatus::Queued;
            self.run_at = now;
        } else {
            self.status = JobStatus::Failed;
            self.finished_at = Some(now);
        }
        Ok(self.status)
    }

    fn invalid_transition(&self, action: &str) -> AppError {
        AppError::QueueError(format!(
            "Cannot {} job {} while it is {}",
            action, self.id, self.status
        ))
    }
}
