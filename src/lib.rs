//! RDFS Worker Node
//!
//! An authenticated HTTP service that stores, serves, deletes and replicates
//! opaque binary chunks keyed by string ids.
//!
//! # Modules
//!
//! - `store`: durable chunk storage with per-id locking
//! - `replication`: pushing chunks to peer nodes
//! - `auth`: shared-secret token gate
//! - `routes`: the HTTP surface

pub mod auth;
pub mod config;
pub mod encoding;
pub mod error;
pub mod heartbeat;
pub mod replication;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Config;
pub use routes::router;
pub use state::AppState;
