/// In-memory object store for tests and local runs without a remote provider
use crate::modules::media::domain::ObjectStore;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
    store_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    failing_stores: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `store` fail with a storage error
    pub fn fail_next_stores(&self, count: usize) {
        self.failing_stores.store(count, Ordering::SeqCst);
    }

    pub fn contains(&self, object_ref: &str) -> bool {
        self.objects.contains_key(object_ref)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn store(&self, bytes: Vec<u8>, folder: &str) -> AppResult<String> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failing_stores
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(AppError::StorageError("Simulated upload failure".to_string()));
        }

        let reference = format!("memory://{}/{}", folder.trim_matches('/'), Uuid::new_v4());
        self.objects.insert(reference.clone(), bytes);
        Ok(reference)
    }

    async fn remove_by_ref(&self, object_ref: &str) -> AppResult<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.objects.remove(object_ref);
        Ok(())
    }
}
