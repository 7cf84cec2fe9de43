//! Chunk Store
//!
//! Front for a [`ChunkStorage`] backend that serializes operations per id.
//! Puts and deletes on one id take that id's write lock; gets and opens take
//! its read lock. Different ids never wait on each other.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};

use tokio::sync::RwLock;

use super::local::{ChunkStorage, LocalChunkStorage};
use super::types::{ChunkHandle, StoreError};

/// Main chunk store with a pluggable backend
#[derive(Clone)]
pub struct ChunkStore {
    inner: Arc<ChunkStoreInner>,
}

struct ChunkStoreInner {
    /// Storage backend
    backend: Box<dyn ChunkStorage>,

    /// Per-id locks; entries die with their last holder
    locks: parking_lot::Mutex<HashMap<String, Weak<RwLock<()>>>>,
}

impl ChunkStore {
    /// Create with a custom backend
    pub fn new(backend: impl ChunkStorage + 'static) -> Self {
        Self {
            inner: Arc::new(ChunkStoreInner {
                backend: Box::new(backend),
                locks: parking_lot::Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create with local filesystem storage
    pub async fn with_local_storage(base_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::new(LocalChunkStorage::open_dir(base_path).await?))
    }

    /// Get the full content of a chunk
    pub async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        check_id(id)?;
        let lock = self.lock_for(id);
        let _guard = lock.read().await;
        self.inner.backend.read(id).await
    }

    /// Open a chunk for streaming.
    ///
    /// The handle keeps reading the version that was current when it was
    /// opened, even if the chunk is replaced or deleted afterwards.
    pub async fn open(&self, id: &str) -> Result<Option<ChunkHandle>, StoreError> {
        check_id(id)?;
        let lock = self.lock_for(id);
        let _guard = lock.read().await;
        self.inner.backend.open(id).await
    }

    /// Create or replace a chunk
    pub async fn put(&self, id: &str, data: &[u8]) -> Result<(), StoreError> {
        check_id(id)?;
        let lock = self.lock_for(id);
        let _guard = lock.write().await;
        self.inner.backend.write(id, data).await?;

        tracing::debug!(id = %id, bytes = data.len(), "Stored chunk");
        Ok(())
    }

    /// Delete a chunk, returning whether it existed
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        check_id(id)?;
        let lock = self.lock_for(id);
        let _guard = lock.write().await;
        let existed = self.inner.backend.remove(id).await?;

        tracing::debug!(id = %id, existed = existed, "Deleted chunk");
        Ok(existed)
    }

    fn lock_for(&self, id: &str) -> Arc<RwLock<()>> {
        let mut locks = self.inner.locks.lock();
        if let Some(lock) = locks.get(id).and_then(Weak::upgrade) {
            return lock;
        }

        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(RwLock::new(()));
        locks.insert(id.to_string(), Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.inner.locks.lock().len()
    }
}

fn check_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() {
        return Err(StoreError::EmptyId);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
