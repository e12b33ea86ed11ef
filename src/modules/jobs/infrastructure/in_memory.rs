/// In-memory broker implementing the same state machine as the PostgreSQL queue
///
/// Used by tests and by local runs without DATABASE_URL. The clock is injectable so
/// backoff can be exercised without sleeping.
use crate::modules::jobs::domain::entities::{JobHandle, JobOptions, JobRecord, JobStatus, JobTask};
use crate::modules::jobs::domain::repository::{JobQueue, JobStatistics};
use crate::shared::errors::{AppError, AppResult};
use crate::log_debug;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Default)]
struct QueueState {
    jobs: HashMap<Uuid, JobRecord>,
    /// Enqueue order, used to break run_at ties
    order: Vec<Uuid>,
}

pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    clock: Clock,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            clock,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn missing(job_id: Uuid) -> AppError {
        AppError::QueueError(format!("Job {} does not exist", job_id))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(
        &self,
        queue_name: &str,
        job: JobTask,
        options: JobOptions,
    ) -> AppResult<JobHandle> {
        job.validate()?;
        options.validate()?;

        let record = JobRecord::new(queue_name, job, options, self.now());
        let handle = record.handle();

        let mut state = self.state.lock().await;
        state.order.push(record.id);
        state.jobs.insert(record.id, record);

        log_debug!("Enqueued job {} on '{}'", handle.id, queue_name);
        Ok(handle)
    }

    async fn dequeue(&self, queue_name: &str) -> AppResult<Option<JobRecord>> {
        let now = self.now();
        let mut state = self.state.lock().await;

        let next = state
            .order
            .iter()
            .enumerate()
            .filter_map(|(position, id)| state.jobs.get(id).map(|job| (position, job)))
            .filter(|(_, job)| job.queue_name == queue_name && job.is_runnable(now))
            .min_by_key(|(position, job)| (job.run_at, *position))
            .map(|(_, job)| job.id);

        let Some(job_id) = next else {
            return Ok(None);
        };

        let job = state.jobs.get_mut(&job_id).ok_or_else(|| Self::missing(job_id))?;
        job.start_attempt(now)?;
        Ok(Some(job.clone()))
    }

    async fn mark_completed(&self, job_id: Uuid) -> AppResult<()> {
        let now = self.now();
        let mut state = self.state.lock().await;
        let job = state.jobs.get_mut(&job_id).ok_or_else(|| Self::missing(job_id))?;
        job.complete(now)
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> AppResult<JobStatus> {
        let now = self.now();
        let mut state = self.state.lock().await;
        let job = state.jobs.get_mut(&job_id).ok_or_else(|| Self::missing(job_id))?;
        job.fail(error, now)
    }

    async fn requeue_stalled(
        &self,
        queue_name: &str,
        older_than: chrono::Duration,
    ) -> AppResult<Vec<JobRecord>> {
        let now = self.now();
        let cutoff = now - older_than;
        let mut state = self.state.lock().await;
        let QueueState { jobs, order } = &mut *state;

        let mut reclaimed = Vec::new();
        for id in order.iter() {
            let Some(job) = jobs.get_mut(id) else {
                continue;
            };
            if job.queue_name == queue_name && job.is_stalled(cutoff) {
                job.reclaim(now)?;
                reclaimed.push(job.clone());
            }
        }
        Ok(reclaimed)
    }

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<JobRecord>> {
        let state = self.state.lock().await;
        Ok(state.jobs.get(&job_id).cloned())
    }

    async fn list_jobs(&self, queue_name: &str) -> AppResult<Vec<JobRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.jobs.get(id))
            .filter(|job| job.queue_name == queue_name)
            .cloned()
            .collect())
    }

    async fn delete_old_finished(&self, older_than: chrono::Duration) -> AppResult<usize> {
        let cutoff = self.now() - older_than;
        let mut state = self.state.lock().await;

        let expired: Vec<Uuid> = state
            .jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .filter(|job| job.finished_at.map_or(false, |at| at < cutoff))
            .map(|job| job.id)
            .collect();

        for id in &expired {
            state.jobs.remove(id);
        }
        state.order.retain(|id| !expired.contains(id));

        Ok(expired.len())
    }

    async fn get_statistics(&self, queue_name: &str) -> AppResult<JobStatistics> {
        let state = self.state.lock().await;
        let mut stats = JobStatistics::default();
        for job in state.jobs.values().filter(|job| job.queue_name == queue_name) {
            stats.record(job.status);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    /// Clock that only moves when told to
    fn manual_clock() -> (Clock, Arc<AtomicI64>) {
        let start = Utc::now();
        let offset_ms = Arc::new(AtomicI64::new(0));
        let offset = Arc::clone(&offset_ms);
        let clock: Clock =
            Arc::new(move || start + chrono::Duration::milliseconds(offset.load(Ordering::SeqCst)));
        (clock, offset_ms)
    }

    fn options(attempts: u32) -> JobOptions {
        JobOptions::new(attempts, Duration::from_millis(5000))
    }

    #[tokio::test]
    async fn enqueue_rejects_invalid_payloads() {
        let queue = InMemoryJobQueue::new();
        let err = queue
            .enqueue("media", JobTask::delete_one(""), options(3))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = queue
            .enqueue("media", JobTask::delete_one("memory://a"), options(0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn dequeue_is_fifo_and_scoped_to_queue() {
        let queue = InMemoryJobQueue::new();
        let first = queue
            .enqueue("media", JobTask::delete_one("memory://1"), options(3))
            .await
            .unwrap();
        queue
            .enqueue("other", JobTask::delete_one("memory://x"), options(3))
            .await
            .unwrap();
        let second = queue
            .enqueue("media", JobTask::delete_one("memory://2"), options(3))
            .await
            .unwrap();

        assert_eq!(queue.dequeue("media").await.unwrap().unwrap().id, first.id);
        assert_eq!(queue.dequeue("media").await.unwrap().unwrap().id, second.id);
        assert!(queue.dequeue("media").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_job_waits_for_backoff_before_retry() {
        let (clock, offset) = manual_clock();
        let queue = InMemoryJobQueue::with_clock(clock);
        let handle = queue
            .enqueue("media", JobTask::delete_one("memory://1"), options(3))
            .await
            .unwrap();

        let job = queue.dequeue("media").await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
        let status = queue.mark_failed(handle.id, "timeout").await.unwrap();
        assert_eq!(status, JobStatus::Queued);

        offset.store(4999, Ordering::SeqCst);
        assert!(queue.dequeue("media").await.unwrap().is_none());

        offset.store(5000, Ordering::SeqCst);
        let retry = queue.dequeue("media").await.unwrap().unwrap();
        assert_eq!(retry.attempts, 2);
    }

    #[tokio::test]
    async fn exhausting_attempts_marks_failed() {
        let (clock, offset) = manual_clock();
        let queue = InMemoryJobQueue::with_clock(clock);
        let handle = queue
            .enqueue("media", JobTask::delete_one("memory://1"), options(2))
            .await
            .unwrap();

        queue.dequeue("media").await.unwrap().unwrap();
        queue.mark_failed(handle.id, "first").await.unwrap();
        offset.store(5000, Ordering::SeqCst);
        queue.dequeue("media").await.unwrap().unwrap();
        let status = queue.mark_failed(handle.id, "second").await.unwrap();

        assert_eq!(status, JobStatus::Failed);
        offset.store(60_000, Ordering::SeqCst);
        assert!(queue.dequeue("media").await.unwrap().is_none());

        let stats = queue.get_statistics("media").await.unwrap();
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.total_count, 1);
    }

    #[tokio::test]
    async fn completing_a_queued_job_is_rejected() {
        let queue = InMemoryJobQueue::new();
        let handle = queue
            .enqueue("media", JobTask::delete_one("memory://1"), options(1))
            .await
            .unwrap();

        assert!(queue.mark_completed(handle.id).await.is_err());
        assert!(queue.mark_completed(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn stalled_jobs_are_reclaimed_after_the_timeout() {
        let (clock, offset) = manual_clock();
        let queue = InMemoryJobQueue::with_clock(clock);
        let retried = queue
            .enqueue("media", JobTask::delete_one("memory://1"), options(3))
            .await
            .unwrap();
        let last_try = queue
            .enqueue("media", JobTask::delete_one("memory://2"), options(1))
            .await
            .unwrap();
        queue.dequeue("media").await.unwrap().unwrap();
        queue.dequeue("media").await.unwrap().unwrap();

        let timeout = chrono::Duration::minutes(5);
        offset.store(60_000, Ordering::SeqCst);
        assert!(queue.requeue_stalled("media", timeout).await.unwrap().is_empty());

        offset.store(5 * 60_000 + 1, Ordering::SeqCst);
        assert!(queue.requeue_stalled("other", timeout).await.unwrap().is_empty());
        let reclaimed = queue.requeue_stalled("media", timeout).await.unwrap();

        let statuses: Vec<_> = reclaimed.iter().map(|job| (job.id, job.status)).collect();
        assert_eq!(
            statuses,
            vec![(retried.id, JobStatus::Queued), (last_try.id, JobStatus::Failed)]
        );

        let again = queue.dequeue("media").await.unwrap().unwrap();
        assert_eq!(again.id, retried.id);
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn retention_removes_only_old_terminal_jobs() {
        let (clock, offset) = manual_clock();
        let queue = InMemoryJobQueue::with_clock(clock);
        let done = queue
            .enqueue("media", JobTask::delete_one("memory://1"), options(1))
            .await
            .unwrap();
        queue
            .enqueue("media", JobTask::delete_one("memory://2"), options(1))
            .await
            .unwrap();

        queue.dequeue("media").await.unwrap();
        queue.mark_completed(done.id).await.unwrap();

        offset.store(2 * 86_400_000, Ordering::SeqCst);
        let removed = queue
            .delete_old_finished(chrono::Duration::days(1))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(queue.get_by_id(done.id).await.unwrap().is_none());
        assert_eq!(queue.list_jobs("media").await.unwrap().len(), 1);
    }
}
