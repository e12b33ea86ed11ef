/// Executes media jobs against the object store and the blog repository
///
/// The processor never retries on its own: any error is returned to the worker,
/// which hands it to the broker.
use crate::modules::blog::domain::{AppendOutcome, BlogRepository};
use crate::modules::cache::CacheInvalidationCoordinator;
use crate::modules::jobs::domain::entities::{DeleteOnePayload, JobRecord, JobTask, UploadManyPayload};
use crate::modules::media::domain::{ObjectStore, StagedFile};
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::sync::Arc;

/// Consumer of one queue
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &JobRecord) -> AppResult<()>;
}

pub struct MediaJobProcessor {
    object_store: Arc<dyn ObjectStore>,
    blogs: Arc<dyn BlogRepository>,
    /// Cache namespace dropped after images were appended
    invalidation: Option<(CacheInvalidationCoordinator, String)>,
}

impl MediaJobProcessor {
    pub fn new(object_store: Arc<dyn ObjectStore>, blogs: Arc<dyn BlogRepository>) -> Self {
        Self {
            object_store,
            blogs,
            invalidation: None,
        }
    }

    pub fn with_cache_invalidation(
        mut self,
        coordinator: CacheInvalidationCoordinator,
        namespace: &str,
    ) -> Self {
        self.invalidation = Some((coordinator, namespace.to_string()));
        self
    }

    /// The appends are already committed, so a cache failure only costs freshness
    async fn invalidate_cache(&self) {
        if let Some((coordinator, namespace)) = &self.invalidation {
            if let Err(e) = coordinator.invalidate_namespace(namespace).await {
                log_warn!("Failed to invalidate '{}' after upload: {}", namespace, e);
            }
        }
    }

    async fn upload_many(&self, job: &JobRecord, payload: &UploadManyPayload) -> AppResult<()> {
        log_debug!(
            "Uploading {} file(s) for blog {} into '{}'",
            payload.files.len(),
            payload.entity_ref,
            payload.destination_folder
        );

        let mut appended = 0usize;
        for (index, file) in payload.files.iter().enumerate() {
            let bytes = match file.read().await {
                Ok(bytes) => bytes,
                // An earlier attempt already consumed this file
                Err(e) if e.kind() == ErrorKind::NotFound && job.is_retry() => {
                    log_warn!(
                        "Staged file {} is gone on attempt {} of job {}, skipping",
                        file.local_path.display(),
                        job.attempts,
                        job.id
                    );
                    continue;
                }
                Err(e) => {
                    return Err(AppError::StorageError(format!(
                        "Failed to read staged file {}: {}",
                        file.local_path.display(),
                        e
                    )))
                }
            };

            file.discard().await?;

            let object_ref = self
                .object_store
                .store(bytes, &payload.destination_folder)
                .await?;

            match self.blogs.append_image(payload.entity_ref, &object_ref).await? {
                AppendOutcome::Appended(image) => {
                    log_debug!("Blog {} gained image {}", payload.entity_ref, image.id);
                    appended += 1;
                    self.invalidate_cache().await;
                }
                AppendOutcome::AlreadyPresent => {
                    log_debug!(
                        "Blog {} already references {}",
                        payload.entity_ref,
                        object_ref
                    );
                }
                AppendOutcome::BlogMissing => {
                    log_warn!(
                        "Blog {} no longer exists, dropping upload {}",
                        payload.entity_ref,
                        object_ref
                    );
                    self.drop_orphans(&object_ref, &payload.files[index + 1..])
                        .await;
                    return Ok(());
                }
            }
        }

        log_info!(
            "Blog {} received {} of {} image(s)",
            payload.entity_ref,
            appended,
            payload.files.len()
        );
        Ok(())
    }

    /// Best effort cleanup once the target blog is gone
    async fn drop_orphans(&self, object_ref: &str, remaining: &[StagedFile]) {
        if let Err(e) = self.object_store.remove_by_ref(object_ref).await {
            log_warn!("Failed to remove orphan object {}: {}", object_ref, e);
        }
        for file in remaining {
            if let Err(e) = file.discard().await {
                log_debug!(
                    "Could not discard staged file {}: {}",
                    file.local_path.display(),
                    e
                );
            }
        }
    }

    async fn delete_one(&self, payload: &DeleteOnePayload) -> AppResult<()> {
        self.object_store.remove_by_ref(&payload.object_ref).await?;
        log_info!("Removed stored object {}", payload.object_ref);
        Ok(())
    }
}

#[async_trait]
impl JobHandler for MediaJobProcessor {
    async fn handle(&self, job: &JobRecord) -> AppResult<()> {
        match &job.task {
            JobTask::UploadMany(payload) => self.upload_many(job, payload).await,
            JobTask::DeleteOne(payload) => self.delete_one(payload).await,
        }
    }
}
