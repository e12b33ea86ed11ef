/// Port for the remote object store that holds uploaded media
///
/// References returned by `store` are opaque; the only thing callers do with
/// them is persist them and hand them back to `remove_by_ref`.
use crate::shared::errors::AppResult;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a buffer under `folder` and return its stable reference
    async fn store(&self, bytes: Vec<u8>, folder: &str) -> AppResult<String>;

    /// Remove a stored object; an unknown or already removed reference is not an error
    async fn remove_by_ref(&self, object_ref: &str) -> AppResult<()>;
}
