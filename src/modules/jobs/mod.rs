/// Background job system module
///
/// Durable queue for the media lifecycle: uploading staged images and deleting
/// stored objects outside of the request path.
///
/// Architecture:
/// - Domain: task variants, the job state machine and the `JobQueue` port
/// - Infrastructure: PostgreSQL and in-memory brokers
/// - Processor: executes media tasks
/// - Worker: polls a queue and reports outcomes back to the broker
/// - Events: lifecycle notifications for observability
pub mod domain;
pub mod events;
pub mod infrastructure;
pub mod processor;
pub mod worker;

// Re-exports for easy access
pub use domain::{
    entities::{
        DeleteOnePayload, ImageField, JobHandle, JobOptions, JobRecord, JobStatus, JobTask,
        JobType, UploadManyPayload, STALLED_JOB_ERROR,
    },
    repository::{JobQueue, JobStatistics},
};
pub use events::{spawn_event_logger, JobEvent, JobEventBus};
pub use infrastructure::{InMemoryJobQueue, PgJobQueue};
pub use processor::{JobHandler, MediaJobProcessor};
pub use worker::{BackgroundWorker, ConsumerRegistry, WorkerStatistics};
