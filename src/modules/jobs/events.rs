/// Job lifecycle events, published for observability only
///
/// Nothing in the pipeline depends on a subscriber being present; publishing
/// with no receivers is a no-op.
use crate::modules::jobs::domain::entities::JobType;
use crate::{log_info, log_error, log_warn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Completed {
        job_id: Uuid,
        queue_name: String,
        job_type: JobType,
        attempts: i32,
    },
    RetryScheduled {
        job_id: Uuid,
        queue_name: String,
        attempt: i32,
        run_at: DateTime<Utc>,
        error: String,
    },
    /// Terminal: the retry budget is spent, or the payload could not be decoded
    /// (`job_type` is then unknown)
    Failed {
        job_id: Uuid,
        queue_name: String,
        job_type: Option<JobType>,
        attempts: i32,
        error: String,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::Completed { job_id, .. }
            | JobEvent::RetryScheduled { job_id, .. }
            | JobEvent::Failed { job_id, .. } => *job_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobEventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl JobEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    pub fn publish(&self, event: JobEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

/// Log every lifecycle event until the bus is dropped
pub fn spawn_event_logger(bus: &JobEventBus) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(JobEvent::Completed {
                    job_id,
                    queue_name,
                    job_type,
                    attempts,
                }) => {
                    log_info!(
                        "[{}] {} job {} completed after {} attempt(s)",
                        queue_name,
                        job_type,
                        job_id,
                        attempts
                    );
                }
                Ok(JobEvent::RetryScheduled {
                    job_id,
                    queue_name,
                    attempt,
                    run_at,
                    error,
                }) => {
                    log_warn!(
                        "[{}] job {} attempt {} failed ({}), retrying at {}",
                        queue_name,
                        job_id,
                        attempt,
                        error,
                        run_at
                    );
                }
                Ok(JobEvent::Failed {
                    job_id,
                    queue_name,
                    job_type,
                    attempts,
                    error,
                }) => {
                    log_error!(
                        "[{}] {} job {} failed permanently after {} attempt(s): {}",
                        queue_name,
                        job_type.map_or_else(|| "undecodable".to_string(), |t| t.to_string()),
                        job_id,
                        attempts,
                        error
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log_warn!("Job event logger skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
