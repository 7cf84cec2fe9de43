//! Chunk transport encoding
//!
//! Chunks travel as standard base64 inside a JSON document:
//!
//! ```json
//! { "id": "README.md", "chunk": "IyBSREZT..." }
//! ```
//!
//! [`EncodedChunkStream`] produces that document straight from an open file
//! with a fixed-size read buffer, so arbitrarily large chunks can be served
//! or replicated without loading them into memory.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Bytes;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::Stream;
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

/// Read buffer size; a multiple of 3 so most reads encode without carry.
const READ_BUFFER_SIZE: usize = 48 * 1024;

/// Encode chunk bytes for transport
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode transported chunk bytes
pub fn decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}

/// First local read error hit by an [`EncodedChunkStream`].
///
/// Once the stream is handed to an HTTP body its errors come back wrapped
/// as transport failures; this keeps the local cause reachable.
#[derive(Clone, Default)]
pub struct ReadFailure(Arc<parking_lot::Mutex<Option<std::io::Error>>>);

impl ReadFailure {
    pub fn take(&self) -> Option<std::io::Error> {
        self.0.lock().take()
    }

    fn record(&self, error: &std::io::Error) {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(std::io::Error::new(error.kind(), error.to_string()));
        }
    }
}

/// Streams `{"id": <id>, "chunk": "<base64>"}` from an open file
pub struct EncodedChunkStream {
    head: Option<Bytes>,
    reader: Option<File>,
    buf: Box<[u8]>,
    /// Up to two bytes waiting for a full base64 group
    carry: Vec<u8>,
    tail: Option<Bytes>,
    failure: ReadFailure,
}

impl EncodedChunkStream {
    pub fn new(id: &str, file: File) -> Self {
        // serde_json handles any quoting the id needs
        let id = serde_json::Value::String(id.to_string()).to_string();
        Self {
            head: Some(Bytes::from(format!("{{\"id\":{},\"chunk\":\"", id))),
            reader: Some(file),
            buf: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            carry: Vec::with_capacity(READ_BUFFER_SIZE + 2),
            tail: Some(Bytes::from_static(b"\"}")),
            failure: ReadFailure::default(),
        }
    }

    /// Handle for checking whether the file read failed after the stream is consumed
    pub fn read_failure(&self) -> ReadFailure {
        self.failure.clone()
    }
}

impl Stream for EncodedChunkStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(head) = this.head.take() {
            return Poll::Ready(Some(Ok(head)));
        }

        while let Some(reader) = this.reader.as_mut() {
            let mut read_buf = ReadBuf::new(&mut this.buf);
            let polled = Pin::new(reader).poll_read(cx, &mut read_buf);
            match polled {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => {
                    this.failure.record(&e);
                    this.reader = None;
                    this.tail = None;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(Ok(())) => {
                    let filled = read_buf.filled();
                    if filled.is_empty() {
                        // EOF: flush the padded remainder
                        this.reader = None;
                        if !this.carry.is_empty() {
                            let rest = STANDARD.encode(&this.carry);
                            this.carry.clear();
                            return Poll::Ready(Some(Ok(Bytes::from(rest))));
                        }
                        break;
                    }

                    this.carry.extend_from_slice(filled);
                    let whole = this.carry.len() / 3 * 3;
                    if whole == 0 {
                        continue;
                    }
                    let encoded = STANDARD.encode(&this.carry[..whole]);
                    this.carry.drain(..whole);
                    return Poll::Ready(Some(Ok(Bytes::from(encoded))));
                }
            }
        }

        Poll::Ready(this.tail.take().map(Ok))
    }
}
