/// Broker port for the durable job queue
///
/// Implementations own job identity and every state transition; workers only
/// report the outcome of an attempt back through `mark_completed` / `mark_failed`.
use crate::modules::jobs::domain::entities::{JobHandle, JobOptions, JobRecord, JobStatus, JobTask};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a task on the named queue with its retry budget
    async fn enqueue(
        &self,
        queue_name: &str,
        task: JobTask,
        options: JobOptions,
    ) -> AppResult<JobHandle>;

    /// Atomically move the oldest runnable job of the queue to Active
    /// Returns None if no jobs are runnable. A job whose payload cannot be decoded
    /// is failed on the spot and reported as `AppError::UndecodableJob`.
    async fn dequeue(&self, queue_name: &str) -> AppResult<Option<JobRecord>>;

    /// Mark an active job as completed
    async fn mark_completed(&self, job_id: Uuid) -> AppResult<()>;

    /// Record a failed attempt; returns Queued when a retry was scheduled, Failed otherwise
    async fn mark_failed(&self, job_id: Uuid, error: &str) -> AppResult<JobStatus>;

    /// Reclaim jobs of the queue left Active since before `now - older_than`
    ///
    /// Jobs with attempts left go back to Queued, runnable at once; the others are
    /// failed. Returns the reclaimed jobs in their new state.
    async fn requeue_stalled(
        &self,
        queue_name: &str,
        older_than: chrono::Duration,
    ) -> AppResult<Vec<JobRecord>>;

    /// Get job by ID
    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<JobRecord>>;

    /// All jobs of a queue in enqueue order (for monitoring and tests)
    async fn list_jobs(&self, queue_name: &str) -> AppResult<Vec<JobRecord>>;

    /// Delete terminal jobs that finished before `now - older_than`
    async fn delete_old_finished(&self, older_than: chrono::Duration) -> AppResult<usize>;

    /// Get job statistics for a queue
    async fn get_statistics(&self, queue_name: &str) -> AppResult<JobStatistics>;
}

/// Job queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JobStatistics {
    pub queued_count: i64,
    pub active_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
    pub total_count: i64,
}

impl JobStatistics {
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued_count += 1,
            JobStatus::Active => self.active_count += 1,
            JobStatus::Completed => self.completed_count += 1,
            JobStatus::Failed => self.failed_count += 1,
        }
        self.total_count += 1;
    }
}
