//! Application state management

use std::sync::Arc;

use crate::auth::AuthGate;
use crate::config::Config;
use crate::replication::ReplicationClient;
use crate::store::{ChunkStore, StoreError};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to open chunk store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to build replication client: {0}")]
    Replication(#[from] reqwest::Error),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    auth: AuthGate,
    store: ChunkStore,
    replication: ReplicationClient,
}

impl AppState {
    /// Open the chunk store under the configured data directory and wire up
    /// the auth gate and replication client.
    pub async fn new(config: Config) -> Result<Self, StateError> {
        let store = ChunkStore::with_local_storage(&config.storage.data_dir).await?;
        Self::with_store(config, store)
    }

    /// Build state around an already opened store
    pub fn with_store(config: Config, store: ChunkStore) -> Result<Self, StateError> {
        let auth = AuthGate::new(&config.auth.token);
        let replication = ReplicationClient::new(&config, store.clone())?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                auth,
                store,
                replication,
            }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the auth gate
    pub fn auth(&self) -> &AuthGate {
        &self.inner.auth
    }

    /// Get the chunk store
    pub fn store(&self) -> &ChunkStore {
        &self.inner.store
    }

    /// Get the replication client
    pub fn replication(&self) -> &ReplicationClient {
        &self.inner.replication
    }

    /// Stop admitting new replications
    pub fn shutdown(&self) {
        tracing::info!("Shutting down application state...");
        self.inner.replication.close();
    }
}
