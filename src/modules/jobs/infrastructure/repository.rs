/// Diesel-based implementation of JobQueue
///
/// Uses PostgreSQL with SELECT FOR UPDATE SKIP LOCKED for atomic job dequeuing,
/// so several worker processes can share one queue table.
use crate::modules::jobs::domain::entities::{
    JobHandle, JobOptions, JobRecord, JobStatus, JobTask, STALLED_JOB_ERROR,
};
use crate::modules::jobs::domain::repository::{JobQueue, JobStatistics};
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::modules::jobs::infrastructure::models::{BackgroundJobModel, NewJob, StatusRow};
use crate::schema::background_jobs;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::Database;
use crate::shared::utils::logger::LogContext;
use crate::{log_debug, log_error};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

const JOB_COLUMNS: &str = "id, queue_name, task_type, payload, status, attempts, max_attempts, \
                           backoff_ms, run_at, created_at, started_at, finished_at, error";

pub struct PgJobQueue {
    db: Arc<Database>,
}

impl PgJobQueue {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(
        &self,
        queue_name: &str,
        job: JobTask,
        options: JobOptions,
    ) -> AppResult<JobHandle> {
        job.validate()?;
        options.validate()?;

        let new_job = NewJob {
            id: Uuid::new_v4(),
            queue_name: queue_name.to_string(),
            task_type: job.job_type().to_string(),
            payload: job.payload_json()?,
            max_attempts: options.attempts_allowed as i32,
            backoff_ms: options.backoff.as_millis() as i64,
            run_at: Utc::now(),
        };
        let db = Arc::clone(&self.db);

        let inserted = task::spawn_blocking(move || -> AppResult<BackgroundJobModel> {
            let mut conn = db.get_connection()?;
            diesel::insert_into(background_jobs::table)
                .values(&new_job)
                .returning(BackgroundJobModel::as_returning())
                .get_result(&mut conn)
                .map_err(|e| AppError::DatabaseError(format!("Failed to enqueue job: {}", e)))
        })
        .await??;

        log_debug!(
            "Enqueued {} job {} on '{}'",
            inserted.task_type,
            inserted.id,
            inserted.queue_name
        );
        Ok(JobHandle {
            id: inserted.id,
            queue_name: inserted.queue_name,
        })
    }

    async fn dequeue(&self, queue_name: &str) -> AppResult<Option<JobRecord>> {
        let db = Arc::clone(&self.db);
        let queue_name = queue_name.to_string();

        let model = task::spawn_blocking(move || -> AppResult<Option<BackgroundJobModel>> {
            let mut conn = db.get_connection()?;

            // Oldest runnable job first; retries re-enter the line at their run_at
            diesel::sql_query(format!(
                r#"
                UPDATE background_jobs
                SET status = 'active',
                    started_at = NOW(),
                    attempts = attempts + 1
                WHERE id = (
                    SELECT id
                    FROM background_jobs
                    WHERE queue_name = $1
                      AND status = 'queued'
                      AND run_at <= NOW()
                    ORDER BY run_at ASC, created_at ASC
                    LIMIT 1
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING {}
                "#,
                JOB_COLUMNS
            ))
            .bind::<diesel::sql_types::Text, _>(queue_name)
            .get_result(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to dequeue job: {}", e)))
        })
        .await??;

        let Some(model) = model else {
            return Ok(None);
        };

        let job_id = model.id;
        let attempts = model.attempts;
        match model.into_job_record() {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // A payload that cannot be decoded will never succeed; fail it for good
                let reason = e.to_string();
                log_error!("Job {} has an undecodable payload: {}", job_id, reason);
                self.fail_permanently(job_id, &reason).await?;
                Err(AppError::UndecodableJob {
                    job_id,
                    attempts,
                    reason,
                })
            }
        }
    }

    async fn mark_completed(&self, job_id: Uuid) -> AppResult<()> {
        let db = Arc::clone(&self.db);

        let updated = task::spawn_blocking(move || -> AppResult<usize> {
            let mut conn = db.get_connection()?;
            diesel::sql_query(
                "UPDATE background_jobs
                 SET status = 'completed', finished_at = NOW(), error = NULL
                 WHERE id = $1 AND status = 'active'",
            )
            .bind::<diesel::sql_types::Uuid, _>(job_id)
            .execute(&mut conn)
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to mark job as completed: {}", e))
            })
        })
        .await??;

        if updated == 0 {
            return Err(AppError::QueueError(format!(
                "Job {} is not active and cannot be completed",
                job_id
            )));
        }
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> AppResult<JobStatus> {
        let db = Arc::clone(&self.db);
        let error = error.to_string();

        let row = task::spawn_blocking(move || -> AppResult<Option<StatusRow>> {
            let mut conn = db.get_connection()?;

            // Re-queue after the fixed backoff while attempts remain, otherwise fail for good
            diesel::sql_query(
                "UPDATE background_jobs
                 SET status = CASE
                     WHEN attempts < max_attempts THEN 'queued'::job_status
                     ELSE 'failed'::job_status
                 END,
                 run_at = CASE
                     WHEN attempts < max_attempts
                         THEN NOW() + backoff_ms * INTERVAL '1 millisecond'
                     ELSE run_at
                 END,
                 finished_at = CASE
                     WHEN attempts >= max_attempts THEN NOW()
                     ELSE NULL
                 END,
                 started_at = NULL,
                 error = $2
                 WHERE id = $1 AND status = 'active'
                 RETURNING status",
            )
            .bind::<diesel::sql_types::Uuid, _>(job_id)
            .bind::<diesel::sql_types::Text, _>(error)
            .get_result(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to mark job as failed: {}", e)))
        })
        .await??;

        row.map(|row| row.status.into()).ok_or_else(|| {
            AppError::QueueError(format!("Job {} is not active and cannot fail", job_id))
        })
    }

    async fn requeue_stalled(
        &self,
        queue_name: &str,
        older_than: chrono::Duration,
    ) -> AppResult<Vec<JobRecord>> {
        let db = Arc::clone(&self.db);
        let queue_name = queue_name.to_string();
        let cutoff = Utc::now() - older_than;

        let models = task::spawn_blocking(move || -> AppResult<Vec<BackgroundJobModel>> {
            let mut conn = db.get_connection()?;

            // Same outcome as a failed attempt, except a retry may run at once
            diesel::sql_query(format!(
                r#"
                UPDATE background_jobs
                SET status = CASE
                        WHEN attempts < max_attempts THEN 'queued'::job_status
                        ELSE 'failed'::job_status
                    END,
                    run_at = CASE WHEN attempts < max_attempts THEN NOW() ELSE run_at END,
                    finished_at = CASE WHEN attempts >= max_attempts THEN NOW() ELSE NULL END,
                    started_at = NULL,
                    error = $3
                WHERE queue_name = $1
                  AND status = 'active'
                  AND started_at < $2
                RETURNING {}
                "#,
                JOB_COLUMNS
            ))
            .bind::<diesel::sql_types::Text, _>(queue_name)
            .bind::<diesel::sql_types::Timestamptz, _>(cutoff)
            .bind::<diesel::sql_types::Text, _>(STALLED_JOB_ERROR)
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to reclaim stalled jobs: {}", e)))
        })
        .await??;

        let mut reclaimed = Vec::with_capacity(models.len());
        for model in models {
            let job_id = model.id;
            match model.into_job_record() {
                Ok(record) => reclaimed.push(record),
                Err(e) => log_error!("Reclaimed job {} has an undecodable payload: {}", job_id, e),
            }
        }
        Ok(reclaimed)
    }

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<JobRecord>> {
        let db = Arc::clone(&self.db);

        let model = task::spawn_blocking(move || -> AppResult<Option<BackgroundJobModel>> {
            let mut conn = db.get_connection()?;
            background_jobs::table
                .find(job_id)
                .select(BackgroundJobModel::as_select())
                .first(&mut conn)
                .optional()
                .map_err(|e| AppError::DatabaseError(format!("Failed to get job by id: {}", e)))
        })
        .await??;

        model.map(BackgroundJobModel::into_job_record).transpose()
    }

    async fn list_jobs(&self, queue_name: &str) -> AppResult<Vec<JobRecord>> {
        let db = Arc::clone(&self.db);
        let queue_name = queue_name.to_string();

        let models = task::spawn_blocking(move || -> AppResult<Vec<BackgroundJobModel>> {
            let mut conn = db.get_connection()?;
            background_jobs::table
                .filter(background_jobs::queue_name.eq(queue_name))
                .order(background_jobs::created_at.asc())
                .select(BackgroundJobModel::as_select())
                .load(&mut conn)
                .map_err(|e| AppError::DatabaseError(format!("Failed to list jobs: {}", e)))
        })
        .await??;

        models
            .into_iter()
            .map(BackgroundJobModel::into_job_record)
            .collect()
    }

    async fn delete_old_finished(&self, older_than: chrono::Duration) -> AppResult<usize> {
        let db = Arc::clone(&self.db);
        let cutoff = Utc::now() - older_than;
        let start = std::time::Instant::now();
        LogContext::db_operation("purge_finished", "background_jobs", None);

        let removed = task::spawn_blocking(move || -> AppResult<usize> {
            let mut conn = db.get_connection()?;
            diesel::delete(
                background_jobs::table
                    .filter(
                        background_jobs::status
                            .eq_any(vec![JobStatusDb::Completed, JobStatusDb::Failed]),
                    )
                    .filter(background_jobs::finished_at.lt(cutoff)),
            )
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete old jobs: {}", e)))
        })
        .await??;

        LogContext::db_operation(
            "purge_finished",
            "background_jobs",
            Some(start.elapsed().as_millis() as u64),
        );
        Ok(removed)
    }

    async fn get_statistics(&self, queue_name: &str) -> AppResult<JobStatistics> {
        let db = Arc::clone(&self.db);
        let queue_name = queue_name.to_string();

        let counts = task::spawn_blocking(move || -> AppResult<Vec<(JobStatusDb, i64)>> {
            let mut conn = db.get_connection()?;
            background_jobs::table
                .filter(background_jobs::queue_name.eq(queue_name))
                .group_by(background_jobs::status)
                .select((background_jobs::status, diesel::dsl::count_star()))
                .load(&mut conn)
                .map_err(|e| AppError::DatabaseError(format!("Failed to count jobs: {}", e)))
        })
        .await??;

        let mut stats = JobStatistics::default();
        for (status, count) in counts {
            let status: JobStatus = status.into();
            match status {
                JobStatus::Queued => stats.queued_count = count,
                JobStatus::Active => stats.active_count = count,
                JobStatus::Completed => stats.completed_count = count,
                JobStatus::Failed => stats.failed_count = count,
            }
            stats.total_count += count;
        }
        Ok(stats)
    }
}

impl PgJobQueue {
    async fn fail_permanently(&self, job_id: Uuid, error: &str) -> AppResult<()> {
        let db = Arc::clone(&self.db);
        let error = error.to_string();

        task::spawn_blocking(move || -> AppResult<()> {
            let mut conn = db.get_connection()?;
            diesel::sql_query(
                "UPDATE background_jobs
                 SET status = 'failed', finished_at = NOW(), started_at = NULL, error = $2
                 WHERE id = $1",
            )
            .bind::<diesel::sql_types::Uuid, _>(job_id)
            .bind::<diesel::sql_types::Text, _>(error)
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to fail job: {}", e)))?;
            Ok(())
        })
        .await?
    }
}
