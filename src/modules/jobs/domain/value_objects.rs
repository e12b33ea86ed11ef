/// Value objects for jobs persistence
use crate::modules::jobs::domain::entities::JobStatus;
use serde::{Deserialize, Serialize};

/// Job status enum matching the `job_status` database type
#[derive(diesel_derive_enum::DbEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[ExistingTypePath = "crate::schema::sql_types::JobStatus"]
#[serde(rename_all = "lowercase")]
pub enum JobStatusDb {
    Queued,
    Active,
    Completed,
    Failed,
}

impl From<JobStatusDb> for JobStatus {
    fn from(status: JobStatusDb) -> Self {
        match status {
            JobStatusDb::Queued => JobStatus::Queued,
            JobStatusDb::Active => JobStatus::Active,
            JobStatusDb::Completed => JobStatus::Completed,
            JobStatusDb::Failed => JobStatus::Failed,
        }
    }
}

impl From<JobStatus> for JobStatusDb {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Queued => JobStatusDb::Queued,
            JobStatus::Active => JobStatusDb::Active,
            JobStatus::Completed => JobStatusDb::Completed,
            JobStatus::Failed => JobStatusDb::Failed,
        }
    }
}
