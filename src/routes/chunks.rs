//! Chunk routes
//!
//! Endpoints (all POST with a JSON body, all behind the token gate):
//! - /get-chunk    `{id}`          - stream `{id, chunk}` back
//! - /store-chunk  `{id, chunk}`   - create or replace a chunk
//! - /delete-chunk `{id}`          - remove a chunk
//! - /send-chunk   `{id, target}`  - push a local chunk to a peer node

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::Response,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::encoding::{self, EncodedChunkStream};
use crate::error::{AppError, Result};
use crate::replication::SendChunkRequest;
use crate::state::AppState;

/// Create the chunk router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/get-chunk", post(get_chunk))
        .route("/store-chunk", post(store_chunk))
        .route("/delete-chunk", post(delete_chunk))
        .route("/send-chunk", post(send_chunk))
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChunkRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StoreChunkRequest {
    pub id: String,
    /// Base64-encoded chunk content
    pub chunk: String,
}

#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    pub id: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct SendChunkResponse {
    pub id: String,
    pub target: String,
    pub size: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Stream a chunk back as `{id, chunk}`
async fn get_chunk(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChunkRef>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    require_id(&request.id)?;

    let handle = state
        .store()
        .open(&request.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Chunk not found: {}", request.id)))?;

    tracing::debug!(id = %request.id, bytes = handle.size, "Serving chunk");

    let body = Body::from_stream(EncodedChunkStream::new(&request.id, handle.file));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Create or replace a chunk
async fn store_chunk(
    State(state): State<AppState>,
    payload: std::result::Result<Json<StoreChunkRequest>, JsonRejection>,
) -> Result<Json<ChunkResponse>> {
    let Json(request) = payload?;
    require_id(&request.id)?;

    let data = encoding::decode(&request.chunk)
        .map_err(|e| AppError::BadRequest(format!("chunk is not valid base64: {}", e)))?;

    let max = state.config().storage.max_chunk_bytes;
    if data.len() > max {
        return Err(AppError::PayloadTooLarge(format!(
            "chunk is {} bytes, limit is {}",
            data.len(),
            max
        )));
    }

    state.store().put(&request.id, &data).await?;
    tracing::info!(id = %request.id, bytes = data.len(), "Stored chunk");

    Ok(Json(ChunkResponse {
        id: request.id,
        size: data.len() as u64,
    }))
}

/// Remove a chunk
async fn delete_chunk(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChunkRef>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(request) = payload?;
    require_id(&request.id)?;

    if !state.store().delete(&request.id).await? {
        return Err(AppError::NotFound(format!("Chunk not found: {}", request.id)));
    }

    tracing::info!(id = %request.id, "Deleted chunk");
    Ok(StatusCode::OK)
}

/// Push a local chunk to a peer node
async fn send_chunk(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SendChunkRequest>, JsonRejection>,
) -> Result<Json<SendChunkResponse>> {
    let Json(request) = payload?;
    require_id(&request.id)?;

    let size = state
        .replication()
        .send_chunk(&request.id, &request.target)
        .await?;

    Ok(Json(SendChunkResponse {
        id: request.id,
        target: request.target,
        size,
    }))
}

fn require_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(AppError::BadRequest("id must not be empty".to_string()));
    }
    Ok(())
}
