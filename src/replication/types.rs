//! Replication types

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Request body for `/send-chunk`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendChunkRequest {
    pub id: String,
    /// Base URL of the peer node, e.g. `http://peer:9999`
    pub target: String,
}

/// Why a replication attempt failed
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("Chunk not found locally: {0}")]
    NotFound(String),

    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Target {target} is unreachable: {source}")]
    Unreachable {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Target {target} did not respond within {secs}s")]
    Timeout { target: String, secs: u64 },

    #[error("Target {target} rejected the chunk with {status}: {body}")]
    Rejected {
        target: String,
        status: u16,
        body: String,
    },

    #[error("No replication slot became free within {secs}s")]
    Busy { secs: u64 },

    #[error("Replication is shutting down")]
    ShuttingDown,

    #[error("Transfer to {target} failed: {source}")]
    Transport {
        target: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ReplicationError {
    /// HTTP status reported to the caller of `/send-chunk`
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReplicationError::NotFound(_) => StatusCode::NOT_FOUND,
            ReplicationError::InvalidTarget { .. } => StatusCode::BAD_REQUEST,
            ReplicationError::Storage(StoreError::EmptyId) => StatusCode::BAD_REQUEST,
            ReplicationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ReplicationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ReplicationError::Busy { .. } | ReplicationError::ShuttingDown => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ReplicationError::Unreachable { .. }
            | ReplicationError::Rejected { .. }
            | ReplicationError::Transport { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            ReplicationError::NotFound(_) => "not_found",
            ReplicationError::InvalidTarget { .. } => "bad_request",
            ReplicationError::Storage(_) => "storage_error",
            ReplicationError::Unreachable { .. } => "upstream_unreachable",
            ReplicationError::Timeout { .. } => "upstream_timeout",
            ReplicationError::Rejected { .. } => "upstream_rejected",
            ReplicationError::Transport { .. } => "upstream_error",
            ReplicationError::Busy { .. } => "busy",
            ReplicationError::ShuttingDown => "unavailable",
        }
    }
}
