//! Peer replication ("send-chunk")
//!
//! Pushes a locally held chunk to another node's `/store-chunk` endpoint.

pub mod client;
pub mod types;

pub use client::ReplicationClient;
pub use types::*;
