//! Chunk storage
//!
//! Durable key/value storage for chunk bytes keyed by an opaque id.
//! [`ChunkStore`] adds per-id serialization on top of a pluggable
//! [`ChunkStorage`] backend.

pub mod chunk_store;
pub mod local;
pub mod types;

pub use chunk_store::ChunkStore;
pub use local::{ChunkStorage, LocalChunkStorage};
pub use types::*;
