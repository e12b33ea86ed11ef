/// Background worker for processing media jobs
///
/// The worker polls one named queue, runs each job on a bounded number of
/// worker slots and reports the outcome back to the broker, which owns retries.
use crate::modules::jobs::domain::entities::{JobRecord, JobStatus};
use crate::modules::jobs::domain::repository::JobQueue;
use crate::modules::jobs::events::{JobEvent, JobEventBus};
use crate::modules::jobs::processor::JobHandler;
use crate::shared::config::WorkerConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use crate::{log_debug, log_error, log_info, log_warn};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// One handler per queue name per process
#[derive(Default)]
pub struct ConsumerRegistry {
    consumers: DashMap<String, Arc<dyn JobHandler>>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_consumer(&self, queue_name: &str, handler: Arc<dyn JobHandler>) -> AppResult<()> {
        match self.consumers.entry(queue_name.to_string()) {
            Entry::Occupied(_) => Err(AppError::QueueError(format!(
                "Queue '{}' already has a consumer",
                queue_name
            ))),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                log_info!("Registered consumer for queue '{}'", queue_name);
                Ok(())
            }
        }
    }

    pub fn consumer(&self, queue_name: &str) -> Option<Arc<dyn JobHandler>> {
        self.consumers
            .get(queue_name)
            .map(|handler| Arc::clone(handler.value()))
    }
}

/// What a poll of the queue produced
enum Dequeued {
    Job(JobRecord),
    /// Failed by the broker on dequeue; only the event was left to publish
    Discarded,
    Empty,
}

/// Background worker that processes jobs from one queue
pub struct BackgroundWorker {
    queue: Arc<dyn JobQueue>,
    queue_name: String,
    handler: Arc<dyn JobHandler>,
    events: JobEventBus,
    config: WorkerConfig,
    slots: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl BackgroundWorker {
    /// Build a worker for a queue whose consumer is already registered
    pub fn new(
        queue: Arc<dyn JobQueue>,
        registry: &ConsumerRegistry,
        queue_name: &str,
        events: JobEventBus,
        config: WorkerConfig,
    ) -> AppResult<Self> {
        let handler = registry.consumer(queue_name).ok_or_else(|| {
            AppError::QueueError(format!("No consumer registered for queue '{}'", queue_name))
        })?;
        let concurrency = config.concurrency.max(1);

        Ok(Self {
            queue,
            queue_name: queue_name.to_string(),
            handler,
            events,
            config: WorkerConfig {
                concurrency,
                ..config
            },
            slots: Arc::new(Semaphore::new(concurrency)),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Start the background worker
    ///
    /// Runs until `stop` is called, then waits for in-flight jobs to finish.
    pub async fn run(self: Arc<Self>) {
        log_info!(
            "Background worker started on '{}' with {} slot(s)",
            self.queue_name,
            self.config.concurrency
        );

        if let Err(e) = self.recover_stalled().await {
            log_error!("Failed to reclaim stalled jobs: {}", e);
        }

        loop {
            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            match self.next_job().await {
                Ok(Dequeued::Job(job)) => {
                    let worker = Arc::clone(&self);
                    tokio::spawn(async move {
                        // The job stays Active until the stall check reclaims it
                        if let Err(e) = worker.execute(job).await {
                            log_error!("Failed to record job outcome: {}", e);
                        }
                        drop(permit);
                    });
                }
                Ok(Dequeued::Discarded) => drop(permit),
                Ok(Dequeued::Empty) => {
                    drop(permit);
                    self.idle().await;
                }
                Err(e) => {
                    drop(permit);
                    log_error!("Error in worker loop: {}", e);
                    self.idle().await;
                }
            }
        }

        // Wait for in-flight jobs; nothing new is dequeued past this point
        let _drained = self.slots.acquire_many(self.config.concurrency as u32).await;
        log_info!("Background worker on '{}' stopped", self.queue_name);
    }

    /// Stop dequeuing new jobs
    pub fn stop(&self) {
        self.shutdown.cancel();
        log_info!("Background worker stop requested");
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    async fn idle(&self) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(self.config.poll_interval) => {}
        }
    }

    /// Process the next job in the queue inline
    ///
    /// Returns true if a job was processed, false if the queue had nothing runnable
    pub async fn process_next_job(&self) -> AppResult<bool> {
        match self.next_job().await? {
            Dequeued::Job(job) => {
                self.execute(job).await?;
                Ok(true)
            }
            Dequeued::Discarded => Ok(true),
            Dequeued::Empty => Ok(false),
        }
    }

    async fn next_job(&self) -> AppResult<Dequeued> {
        match self.queue.dequeue(&self.queue_name).await {
            Ok(Some(job)) => Ok(Dequeued::Job(job)),
            Ok(None) => Ok(Dequeued::Empty),
            Err(AppError::UndecodableJob {
                job_id,
                attempts,
                reason,
            }) => {
                LogContext::job_transition(
                    &self.queue_name,
                    &job_id,
                    "active -> failed",
                    Some(reason.as_str()),
                );
                self.events.publish(JobEvent::Failed {
                    job_id,
                    queue_name: self.queue_name.clone(),
                    job_type: None,
                    attempts,
                    error: reason,
                });
                Ok(Dequeued::Discarded)
            }
            Err(e) => Err(e),
        }
    }

    /// Run the handler on its own task so a panic becomes a failed attempt
    async fn run_handler(&self, job: &JobRecord) -> AppResult<()> {
        let handler = Arc::clone(&self.handler);
        let attempt = job.clone();

        match tokio::spawn(async move { handler.handle(&attempt).await }).await {
            Ok(result) => result,
            Err(e) => Err(AppError::InternalError(format!("Job handler aborted: {}", e))),
        }
    }

    async fn execute(&self, job: JobRecord) -> AppResult<()> {
        log_info!(
            "Processing job {} (type: {}, attempts: {}/{})",
            job.id,
            job.job_type(),
            job.attempts,
            job.max_attempts
        );
        LogContext::job_transition(&self.queue_name, &job.id, "queued -> active", None);

        match self.run_handler(&job).await {
            Ok(()) => {
                self.queue.mark_completed(job.id).await?;
                LogContext::job_transition(&self.queue_name, &job.id, "active -> completed", None);
                self.events.publish(JobEvent::Completed {
                    job_id: job.id,
                    queue_name: self.queue_name.clone(),
                    job_type: job.job_type(),
                    attempts: job.attempts,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                log_warn!("Job {} failed: {}", job.id, error_msg);

                let status = self.queue.mark_failed(job.id, &error_msg).await?;
                if status.is_terminal() {
                    LogContext::job_transition(
                        &self.queue_name,
                        &job.id,
                        "active -> failed",
                        Some(error_msg.as_str()),
                    );
                    self.events.publish(JobEvent::Failed {
                        job_id: job.id,
                        queue_name: self.queue_name.clone(),
                        job_type: Some(job.job_type()),
                        attempts: job.attempts,
                        error: error_msg,
                    });
                } else {
                    let run_at = match self.queue.get_by_id(job.id).await? {
                        Some(current) => current.run_at,
                        None => Utc::now() + chrono::Duration::milliseconds(job.backoff_ms),
                    };
                    log_debug!(
                        "Job {} will be retried at {} (attempt {}/{})",
                        job.id,
                        run_at,
                        job.attempts,
                        job.max_attempts
                    );
                    LogContext::job_transition(
                        &self.queue_name,
                        &job.id,
                        "active -> queued",
                        Some(error_msg.as_str()),
                    );
                    self.events.publish(JobEvent::RetryScheduled {
                        job_id: job.id,
                        queue_name: self.queue_name.clone(),
                        attempt: job.attempts,
                        run_at,
                        error: error_msg,
                    });
                }
            }
        }

        Ok(())
    }

    /// Hand jobs abandoned in Active (crashed process, lost outcome) back to the broker
    pub async fn recover_stalled(&self) -> AppResult<usize> {
        let older_than = chrono::Duration::from_std(self.config.stall_timeout)
            .map_err(|e| AppError::InvalidInput(format!("Stall timeout out of range: {}", e)))?;
        let reclaimed = self.queue.requeue_stalled(&self.queue_name, older_than).await?;

        for job in &reclaimed {
            let error = job.error.clone().unwrap_or_default();
            if job.status == JobStatus::Failed {
                LogContext::job_transition(&self.queue_name, &job.id, "stalled -> failed", None);
                self.events.publish(JobEvent::Failed {
                    job_id: job.id,
                    queue_name: self.queue_name.clone(),
                    job_type: Some(job.job_type()),
                    attempts: job.attempts,
                    error,
                });
            } else {
                LogContext::job_transition(&self.queue_name, &job.id, "stalled -> queued", None);
                self.events.publish(JobEvent::RetryScheduled {
                    job_id: job.id,
                    queue_name: self.queue_name.clone(),
                    attempt: job.attempts,
                    run_at: job.run_at,
                    error,
                });
            }
        }

        if !reclaimed.is_empty() {
            log_warn!(
                "Reclaimed {} stalled job(s) on '{}'",
                reclaimed.len(),
                self.queue_name
            );
        }
        Ok(reclaimed.len())
    }

    /// Delete terminal jobs older than the retention window
    pub async fn purge_finished(&self, older_than: chrono::Duration) -> AppResult<usize> {
        let removed = self.queue.delete_old_finished(older_than).await?;
        if removed > 0 {
            log_info!("Purged {} finished job(s)", removed);
        }
        Ok(removed)
    }

    /// Get statistics about the worker and job queue
    pub async fn get_statistics(&self) -> AppResult<WorkerStatistics> {
        let job_stats = self.queue.get_statistics(&self.queue_name).await?;

        Ok(WorkerStatistics {
            is_running: self.is_running(),
            queued_jobs: job_stats.queued_count,
            active_jobs: job_stats.active_count,
            completed_jobs: job_stats.completed_count,
            failed_jobs: job_stats.failed_count,
            total_jobs: job_stats.total_count,
        })
    }
}

/// Worker statistics for monitoring
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkerStatistics {
    pub is_running: bool,
    pub queued_jobs: i64,
    pub active_jobs: i64,
    pub completed_jobs: i64,
    pub failed_jobs: i64,
    pub total_jobs: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::jobs::domain::entities::{JobOptions, JobTask, JobType, STALLED_JOB_ERROR};
    use crate::modules::jobs::domain::repository::MockJobQueue;
    use crate::modules::jobs::infrastructure::InMemoryJobQueue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, _job: &JobRecord) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::StorageError("unreachable".to_string()));
            }
            Ok(())
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl JobHandler for PanickingHandler {
        async fn handle(&self, _job: &JobRecord) -> AppResult<()> {
            panic!("handler bug");
        }
    }

    fn worker_for(
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
        events: JobEventBus,
    ) -> BackgroundWorker {
        let registry = ConsumerRegistry::new();
        registry.register_consumer("media", handler).unwrap();
        BackgroundWorker::new(queue, &registry, "media", events, WorkerConfig::default()).unwrap()
    }

    #[test]
    fn second_consumer_for_a_queue_is_rejected() {
        let registry = ConsumerRegistry::new();
        registry
            .register_consumer("media", Arc::new(CountingHandler::default()))
            .unwrap();

        let err = registry
            .register_consumer("media", Arc::new(CountingHandler::default()))
            .unwrap_err();
        assert!(matches!(err, AppError::QueueError(_)));
        assert!(registry
            .register_consumer("other", Arc::new(CountingHandler::default()))
            .is_ok());
    }

    #[test]
    fn worker_requires_a_registered_consumer() {
        let registry = ConsumerRegistry::new();
        let result = BackgroundWorker::new(
            Arc::new(InMemoryJobQueue::new()),
            &registry,
            "media",
            JobEventBus::new(),
            WorkerConfig::default(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn successful_job_is_completed_and_announced() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let handler = Arc::new(CountingHandler::default());
        let events = JobEventBus::new();
        let mut receiver = events.subscribe();
        let worker = worker_for(queue.clone(), handler.clone(), events);

        let handle = queue
            .enqueue("media", JobTask::delete_one("memory://1"), JobOptions::media_default())
            .await
            .unwrap();

        assert!(worker.process_next_job().await.unwrap());
        assert!(!worker.process_next_job().await.unwrap());

        let job = queue.get_by_id(handle.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(matches!(receiver.recv().await.unwrap(), JobEvent::Completed { .. }));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_job_is_requeued_with_retry_event() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let handler = Arc::new(CountingHandler {
            fail: true,
            ..Default::default()
        });
        let events = JobEventBus::new();
        let mut receiver = events.subscribe();
        let worker = worker_for(queue.clone(), handler, events);

        let handle = queue
            .enqueue("media", JobTask::delete_one("memory://1"), JobOptions::media_default())
            .await
            .unwrap();
        worker.process_next_job().await.unwrap();

        let job = queue.get_by_id(handle.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        match receiver.recv().await.unwrap() {
            JobEvent::RetryScheduled { attempt, run_at, .. } => {
                assert_eq!(attempt, 1);
                assert_eq!(run_at, job.run_at);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn panicking_handler_counts_as_a_failed_attempt() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let events = JobEventBus::new();
        let mut receiver = events.subscribe();
        let worker = Arc::new(worker_for(queue.clone(), Arc::new(PanickingHandler), events));

        let handle = queue
            .enqueue(
                "media",
                JobTask::delete_one("memory://1"),
                JobOptions::new(3, Duration::ZERO),
            )
            .await
            .unwrap();

        let running = tokio::spawn(Arc::clone(&worker).run());
        let mut failed_attempts = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
                .await
                .unwrap()
                .unwrap();
            match event {
                JobEvent::RetryScheduled { attempt, .. } => failed_attempts.push(attempt),
                JobEvent::Failed { attempts, job_type, .. } => {
                    assert_eq!(attempts, 3);
                    assert_eq!(job_type, Some(JobType::DeleteOne));
                    break;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        worker.stop();
        running.await.unwrap();

        assert_eq!(failed_attempts, vec![1, 2]);
        let job = queue.get_by_id(handle.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("aborted"));
    }

    #[tokio::test]
    async fn undecodable_job_is_announced_as_failed() {
        let job_id = Uuid::new_v4();
        let mut queue = MockJobQueue::new();
        queue.expect_dequeue().times(1).returning(move |_| {
            Err(AppError::UndecodableJob {
                job_id,
                attempts: 1,
                reason: "Unknown job type: resize".to_string(),
            })
        });
        let events = JobEventBus::new();
        let mut receiver = events.subscribe();
        let worker = worker_for(Arc::new(queue), Arc::new(CountingHandler::default()), events);

        assert!(worker.process_next_job().await.unwrap());

        match receiver.recv().await.unwrap() {
            JobEvent::Failed {
                job_id: failed,
                job_type,
                attempts,
                error,
                ..
            } => {
                assert_eq!(failed, job_id);
                assert_eq!(job_type, None);
                assert_eq!(attempts, 1);
                assert!(error.contains("resize"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn stalled_jobs_are_reclaimed_with_events() {
        let job_id = Uuid::new_v4();
        let mut queue = MockJobQueue::new();
        queue
            .expect_requeue_stalled()
            .withf(|queue_name, older_than| {
                queue_name == "media" && *older_than == chrono::Duration::seconds(300)
            })
            .times(1)
            .returning(move |_, _| {
                let mut job = JobRecord::new(
                    "media",
                    JobTask::delete_one("memory://1"),
                    JobOptions::media_default(),
                    Utc::now(),
                );
                job.id = job_id;
                job.start_attempt(Utc::now()).unwrap();
                job.reclaim(Utc::now()).unwrap();
                Ok(vec![job])
            });
        let events = JobEventBus::new();
        let mut receiver = events.subscribe();
        let worker = worker_for(Arc::new(queue), Arc::new(CountingHandler::default()), events);

        assert_eq!(worker.recover_stalled().await.unwrap(), 1);
        match receiver.recv().await.unwrap() {
            JobEvent::RetryScheduled {
                job_id: reclaimed,
                attempt,
                error,
                ..
            } => {
                assert_eq!(reclaimed, job_id);
                assert_eq!(attempt, 1);
                assert_eq!(error, STALLED_JOB_ERROR);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn run_processes_jobs_until_stopped() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let handler = Arc::new(CountingHandler::default());
        let events = JobEventBus::new();
        let mut receiver = events.subscribe();
        let worker = Arc::new(worker_for(queue.clone(), handler.clone(), events));

        for i in 0..3 {
            queue
                .enqueue(
                    "media",
                    JobTask::delete_one(format!("memory://{}", i)),
                    JobOptions::media_default(),
                )
                .await
                .unwrap();
        }

        let running = tokio::spawn(Arc::clone(&worker).run());
        for _ in 0..3 {
            tokio::time::timeout(Duration::from_secs(5), receiver.recv())
                .await
                .unwrap()
                .unwrap();
        }
        worker.stop();
        running.await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        let stats = worker.get_statistics().await.unwrap();
        assert_eq!(stats.completed_jobs, 3);
        assert!(!stats.is_running);
    }
}
