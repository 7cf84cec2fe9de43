//! Replication client
//!
//! Streams a local chunk to a peer's `/store-chunk` endpoint using the shared
//! node token. Outbound calls are bounded by a semaphore and a total timeout;
//! nothing is retried here.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Body, Client, Url};
use tokio::sync::Semaphore;

use crate::config::{Config, TOKEN_HEADER};
use crate::encoding::{EncodedChunkStream, ReadFailure};
use crate::store::{ChunkStore, StoreError};

use super::types::ReplicationError;

/// Longest slice of a peer's error body kept for diagnostics
const MAX_REJECTION_BODY: usize = 512;

#[derive(Clone)]
pub struct ReplicationClient {
    inner: Arc<ReplicationClientInner>,
}

struct ReplicationClientInner {
    http: Client,
    token: String,
    store: ChunkStore,
    permits: Semaphore,
    send_timeout: Duration,
    queue_timeout: Duration,
}

impl ReplicationClient {
    pub fn new(config: &Config, store: ChunkStore) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(config.replication.connect_timeout())
            .timeout(config.replication.send_timeout())
            .build()?;

        Ok(Self {
            inner: Arc::new(ReplicationClientInner {
                http,
                token: config.auth.token.clone(),
                store,
                permits: Semaphore::new(config.replication.max_concurrent_sends.max(1)),
                send_timeout: config.replication.send_timeout(),
                queue_timeout: config.replication.queue_timeout(),
            }),
        })
    }

    /// Push chunk `id` to the node at `target`.
    ///
    /// Returns the number of bytes sent. If the chunk is absent locally the
    /// target is never contacted.
    pub async fn send_chunk(&self, id: &str, target: &str) -> Result<u64, ReplicationError> {
        let url = store_endpoint(target)?;

        let handle = self
            .inner
            .store
            .open(id)
            .await?
            .ok_or_else(|| ReplicationError::NotFound(id.to_string()))?;

        let queued = tokio::time::timeout(self.inner.queue_timeout, self.inner.permits.acquire());
        let _permit = match queued.await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ReplicationError::ShuttingDown),
            Err(_) => {
                tracing::warn!(id = %id, peer = %target, "No free replication slot");
                return Err(ReplicationError::Busy {
                    secs: self.inner.queue_timeout.as_secs(),
                });
            }
        };

        tracing::debug!(id = %id, peer = %target, bytes = handle.size, "Sending chunk");

        let stream = EncodedChunkStream::new(id, handle.file);
        let read_failure = stream.read_failure();
        let body = Body::wrap_stream(stream);
        let response = self
            .inner
            .http
            .post(url)
            .header(TOKEN_HEADER, &self.inner.token)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(target, e, &read_failure))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_REJECTION_BODY {
                let mut end = MAX_REJECTION_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }

            tracing::warn!(id = %id, peer = %target, status = %status, "Target rejected chunk");
            return Err(ReplicationError::Rejected {
                target: target.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(id = %id, peer = %target, bytes = handle.size, "Replicated chunk");
        Ok(handle.size)
    }

    /// Refuse further sends; in-flight sends run to completion.
    pub fn close(&self) {
        self.inner.permits.close();
    }

    fn classify(
        &self,
        target: &str,
        error: reqwest::Error,
        read_failure: &ReadFailure,
    ) -> ReplicationError {
        // A failed local read surfaces as a body error; it is ours, not the target's
        if let Some(source) = read_failure.take() {
            tracing::error!(peer = %target, error = %source, "Reading chunk for replication failed");
            return ReplicationError::Storage(StoreError::Io {
                op: "stream chunk",
                source,
            });
        }

        let target = target.to_string();
        tracing::warn!(peer = %target, error = %error, "Replication request failed");

        if error.is_timeout() {
            ReplicationError::Timeout {
                target,
                secs: self.inner.send_timeout.as_secs(),
            }
        } else if error.is_connect() {
            ReplicationError::Unreachable {
                target,
                source: error,
            }
        } else {
            ReplicationError::Transport {
                target,
                source: error,
            }
        }
    }
}

/// Resolve a peer base URL to its store endpoint
fn store_endpoint(target: &str) -> Result<Url, ReplicationError> {
    let invalid = |reason: String| ReplicationError::InvalidTarget {
        target: target.to_string(),
        reason,
    };

    let mut base = Url::parse(target.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
    }

    // Treat the target path as a directory so "http://host/node" keeps its prefix
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join("store-chunk").map_err(|e| invalid(e.to_string()))
}
