//! Storage types

use tokio::fs::File;

/// An opened chunk, positioned at its first byte
#[derive(Debug)]
pub struct ChunkHandle {
    pub file: File,
    pub size: u64,
}

/// Storage errors
///
/// A missing chunk is not an error at this layer; lookups return `None`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Chunk id must not be empty")]
    EmptyId,

    #[error("Storage I/O failed ({op}): {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(op: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| StoreError::Io { op, source }
    }
}
