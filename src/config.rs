//! Configuration management for the RDFS worker node
//!
//! All settings are read from the environment once at startup and then
//! passed around as an immutable [`Config`].

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Header carrying the shared node token.
pub const TOKEN_HEADER: &str = "x-rdfs-token";

/// Room in a store request body for the id and JSON framing
const BODY_FRAMING_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub replication: ReplicationConfig,
    pub heartbeat: HeartbeatConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub token: String,
}

// Keep the secret out of logs and debug output.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig").field("token", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Largest decoded chunk accepted by `/store-chunk`
    pub max_chunk_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    pub send_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_concurrent_sends: usize,
    /// How long a send may wait for a free slot before answering busy
    pub queue_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Master base URL; the heartbeat is disabled when unset
    pub endpoint: Option<String>,
    pub interval_secs: u64,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("RDFS_TOKEN must be set to a non-empty value")]
    MissingToken,

    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StorageConfig {
    /// Request body limit for store requests, `None` if it does not fit in `usize`.
    ///
    /// Base64 inflates 3 bytes into 4.
    pub fn max_body_bytes(&self) -> Option<usize> {
        self.max_chunk_bytes
            .div_ceil(3)
            .checked_mul(4)?
            .checked_add(BODY_FRAMING_BYTES)
    }
}

impl ReplicationConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        ReplicationConfig {
            send_timeout_secs: 30,
            connect_timeout_secs: 5,
            max_concurrent_sends: 8,
            queue_timeout_secs: 30,
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        HeartbeatConfig {
            endpoint: None,
            interval_secs: 4,
        }
    }
}

impl Config {
    /// Build a configuration with default settings around a token and data directory.
    pub fn new(token: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8888,
            },
            auth: AuthConfig {
                token: token.into(),
            },
            storage: StorageConfig {
                data_dir: data_dir.into(),
                max_chunk_bytes: 64 * 1024 * 1024,
            },
            replication: ReplicationConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let token = env::var("RDFS_TOKEN").unwrap_or_default();
        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }

        let config = Config {
            server: ServerConfig {
                host: env::var("RDFS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("RDFS_PORT", 8888)?,
            },
            auth: AuthConfig { token },
            storage: StorageConfig {
                data_dir: env::var("RDFS_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./rdfs-data")),
                max_chunk_bytes: parse_var("RDFS_MAX_CHUNK_BYTES", 64 * 1024 * 1024)?,
            },
            replication: ReplicationConfig {
                send_timeout_secs: parse_var("RDFS_SEND_TIMEOUT_SECS", 30)?,
                connect_timeout_secs: parse_var("RDFS_CONNECT_TIMEOUT_SECS", 5)?,
                max_concurrent_sends: parse_var("RDFS_MAX_CONCURRENT_SENDS", 8)?,
                queue_timeout_secs: parse_var("RDFS_SEND_QUEUE_TIMEOUT_SECS", 30)?,
            },
            heartbeat: HeartbeatConfig {
                endpoint: env::var("RDFS_ENDPOINT").ok().filter(|e| !e.trim().is_empty()),
                interval_secs: parse_var("RDFS_HEARTBEAT_SECS", 4)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that parse but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.max_body_bytes().is_none() {
            return Err(ConfigError::InvalidValue {
                var: "RDFS_MAX_CHUNK_BYTES",
                value: self.storage.max_chunk_bytes.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit_covers_encoded_chunk() {
        let config = Config::new("secret", "/tmp/unused");
        let max = config.storage.max_chunk_bytes;
        assert!(config.storage.max_body_bytes().unwrap() > max / 3 * 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_huge_chunk_limit_is_rejected() {
        let mut config = Config::new("secret", "/tmp/unused");
        for max in [usize::MAX, usize::MAX / 4 * 3] {
            config.storage.max_chunk_bytes = max;
            assert!(config.storage.max_body_bytes().is_none(), "{max}");
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidValue { var: "RDFS_MAX_CHUNK_BYTES", .. })
            ));
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config::new("super-secret", "/tmp/unused");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
    }
}
