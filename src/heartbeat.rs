//! Background heartbeat to the master node
//!
//! When a master endpoint is configured the worker announces itself every
//! few seconds. Failures are only logged; request handling never depends on
//! the master being reachable.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::{Config, TOKEN_HEADER};

#[derive(Debug, Serialize)]
pub struct Heartbeat {
    pub port: u16,
    pub version: &'static str,
    pub sent_at: DateTime<Utc>,
}

/// Spawn the heartbeat loop, or return `None` when no master is configured.
pub fn spawn(config: &Config) -> Option<JoinHandle<()>> {
    let endpoint = config.heartbeat.endpoint.as_ref()?;
    let url = format!("{}/heartbeat", endpoint.trim_end_matches('/'));
    let interval = Duration::from_secs(config.heartbeat.interval_secs.max(1));
    let token = config.auth.token.clone();
    let port = config.server.port;

    let client = match Client::builder()
        .connect_timeout(config.replication.connect_timeout())
        .timeout(interval)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("Heartbeat disabled, could not build HTTP client: {}", e);
            return None;
        }
    };

    tracing::info!(master = %url, every_secs = interval.as_secs(), "Starting heartbeat");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let beat = Heartbeat {
                port,
                version: env!("CARGO_PKG_VERSION"),
                sent_at: Utc::now(),
            };

            match client
                .post(&url)
                .header(TOKEN_HEADER, &token)
                .json(&beat)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    tracing::trace!("Heartbeat acknowledged");
                }
                Ok(response) => {
                    tracing::warn!(status = %response.status(), "Master rejected heartbeat");
                }
                Err(e) => {
                    tracing::warn!("Heartbeat failed: {}", e);
                }
            }
        }
    }))
}
