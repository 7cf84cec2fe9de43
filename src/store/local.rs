//! Local filesystem chunk storage
//!
//! Chunks live in a sharded directory tree keyed by the SHA-256 of their id:
//!
//! ```text
//! {root}/chunks/{xx}/{sha256(id)}.chunk
//! ```
//!
//! Raw ids never reach the filesystem, so ids such as `../etc/passwd` are
//! just keys like any other.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::types::{ChunkHandle, StoreError};

const CHUNK_EXTENSION: &str = "chunk";
const TEMP_EXTENSION: &str = "tmp";

// ============================================================================
// Storage Trait
// ============================================================================

/// Trait for chunk storage backends
///
/// Backends are not required to serialize access to a single id;
/// [`ChunkStore`](super::ChunkStore) does that. A `write` must still replace
/// content atomically so that a concurrent `open` sees either version in full.
#[async_trait]
pub trait ChunkStorage: Send + Sync {
    /// Read the whole chunk into memory
    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Open the chunk for streaming
    async fn open(&self, id: &str) -> Result<Option<ChunkHandle>, StoreError>;

    /// Create or replace the chunk
    async fn write(&self, id: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Remove the chunk, returning whether it existed
    async fn remove(&self, id: &str) -> Result<bool, StoreError>;
}

// ============================================================================
// Local Filesystem Storage
// ============================================================================

/// Local filesystem chunk storage
pub struct LocalChunkStorage {
    chunks_dir: PathBuf,
}

impl LocalChunkStorage {
    /// Open (and create if needed) storage rooted at `base_path`.
    ///
    /// Temp files left behind by an interrupted write are removed.
    pub async fn open_dir(base_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let chunks_dir = base_path.as_ref().join("chunks");
        fs::create_dir_all(&chunks_dir)
            .await
            .map_err(StoreError::io("create chunks directory"))?;

        let storage = Self { chunks_dir };
        let swept = storage.sweep_temp_files().await?;
        if swept > 0 {
            tracing::warn!(count = swept, "Removed stale temp files from interrupted writes");
        }

        tracing::debug!("Initialized chunk storage at {:?}", storage.chunks_dir);
        Ok(storage)
    }

    /// Path of the file backing `id`
    pub fn chunk_path(&self, id: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(id.as_bytes()));
        self.chunks_dir
            .join(&digest[..2])
            .join(format!("{}.{}", digest, CHUNK_EXTENSION))
    }

    async fn sweep_temp_files(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        let mut shards = fs::read_dir(&self.chunks_dir)
            .await
            .map_err(StoreError::io("list chunks directory"))?;

        while let Some(shard) = shards
            .next_entry()
            .await
            .map_err(StoreError::io("list chunks directory"))?
        {
            if !shard.path().is_dir() {
                continue;
            }

            let mut entries = fs::read_dir(shard.path())
                .await
                .map_err(StoreError::io("list shard directory"))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(StoreError::io("list shard directory"))?
            {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some(TEMP_EXTENSION) {
                    fs::remove_file(&path)
                        .await
                        .map_err(StoreError::io("remove temp file"))?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

#[async_trait]
impl ChunkStorage for LocalChunkStorage {
    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.chunk_path(id)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io {
                op: "read chunk",
                source: e,
            }),
        }
    }

    async fn open(&self, id: &str) -> Result<Option<ChunkHandle>, StoreError> {
        let file = match fs::File::open(self.chunk_path(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    op: "open chunk",
                    source: e,
                })
            }
        };

        let size = file
            .metadata()
            .await
            .map_err(StoreError::io("stat chunk"))?
            .len();

        Ok(Some(ChunkHandle { file, size }))
    }

    async fn write(&self, id: &str, data: &[u8]) -> Result<(), StoreError> {
        let chunk_path = self.chunk_path(id);
        if let Some(parent) = chunk_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(StoreError::io("create shard directory"))?;
        }

        // Atomic write: temp file + fsync + rename
        let temp_path = chunk_path.with_extension(format!("{}.{}", Uuid::new_v4(), TEMP_EXTENSION));
        let result = async {
            let mut file = fs::File::create(&temp_path)
                .await
                .map_err(StoreError::io("create temp file"))?;
            file.write_all(data)
                .await
                .map_err(StoreError::io("write chunk"))?;
            file.sync_all()
                .await
                .map_err(StoreError::io("sync chunk"))?;
            fs::rename(&temp_path, &chunk_path)
                .await
                .map_err(StoreError::io("commit chunk"))
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.chunk_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io {
                op: "remove chunk",
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_ids_do_not_escape_root() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalChunkStorage::open_dir(temp_dir.path()).await.unwrap();

        for id in ["../../etc/passwd", "/absolute", "a/b/c", ".", ".."] {
            let path = storage.chunk_path(id);
            assert!(path.starts_with(temp_dir.path().join("chunks")), "{id}");
            assert_eq!(path.extension().unwrap(), CHUNK_EXTENSION);
        }
    }

    #[tokio::test]
    async fn test_write_replaces_and_open_streams() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalChunkStorage::open_dir(temp_dir.path()).await.unwrap();

        storage.write("a", b"first").await.unwrap();
        storage.write("a", b"second version").await.unwrap();

        let mut handle = storage.open("a").await.unwrap().unwrap();
        assert_eq!(handle.size, 14);
        let mut content = Vec::new();
        handle.file.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"second version");

        assert!(storage.open("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_keeps_version_across_replace() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalChunkStorage::open_dir(temp_dir.path()).await.unwrap();

        storage.write("a", b"old").await.unwrap();
        let mut handle = storage.open("a").await.unwrap().unwrap();
        storage.write("a", b"new!").await.unwrap();

        let mut content = Vec::new();
        handle.file.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"old");
        assert_eq!(storage.read("a").await.unwrap().unwrap(), b"new!");
    }

    #[tokio::test]
    async fn test_stale_temp_files_are_swept() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalChunkStorage::open_dir(temp_dir.path()).await.unwrap();
        storage.write("kept", b"data").await.unwrap();

        let chunk_path = storage.chunk_path("kept");
        let stale = chunk_path.with_extension(format!("{}.{}", Uuid::new_v4(), TEMP_EXTENSION));
        fs::write(&stale, b"partial").await.unwrap();
        drop(storage);

        let storage = LocalChunkStorage::open_dir(temp_dir.path()).await.unwrap();
        assert!(!stale.exists());
        assert_eq!(storage.read("kept").await.unwrap().unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_remove_reports_absence() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalChunkStorage::open_dir(temp_dir.path()).await.unwrap();

        assert!(!storage.remove("never-stored").await.unwrap());
        storage.write("x", b"").await.unwrap();
        assert!(storage.remove("x").await.unwrap());
        assert!(storage.read("x").await.unwrap().is_none());
    }
}
