use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file received by the request layer and parked on local disk until a
/// worker moves it to the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    pub local_path: PathBuf,
    pub filename: String,
}

impl StagedFile {
    pub fn new(local_path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            filename: filename.into(),
        }
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.local_path).await
    }

    pub async fn discard(&self) -> std::io::Result<()> {
        tokio::fs::remove_file(&self.local_path).await
    }
}
