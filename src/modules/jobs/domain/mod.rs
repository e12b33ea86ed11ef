pub mod entities;
pub mod repository;
pub mod value_objects;

pub use entities::{
    DeleteOnePayload, ImageField, JobHandle, JobOptions, JobRecord, JobStatus, JobTask, JobType,
    UploadManyPayload, STALLED_JOB_ERROR,
};
pub use repository::{JobQueue, JobStatistics};
pub use value_objects::JobStatusDb;
