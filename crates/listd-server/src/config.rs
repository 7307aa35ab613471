// ABOUTME: Configuration loading and validation for the listd server.
// ABOUTME: Reads LISTD_* environment variables with defaults; CLI flags may override the result.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LISTD_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("LISTD_SNAPSHOT_INTERVAL_SECS must be a positive integer, got {0:?}")]
    InvalidSnapshotInterval(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ListdConfig {
    pub home: PathBuf,
    pub bind: SocketAddr,
    pub snapshot_interval: Duration,
}

impl ListdConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - LISTD_HOME: data directory (default: ~/.listd)
    /// - LISTD_BIND: socket address to bind (default: 127.0.0.1:1234)
    /// - LISTD_SNAPSHOT_INTERVAL_SECS: seconds between snapshots (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = std::env::var("LISTD_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp"))
                    .join(".listd")
            });

        let bind_str = std::env::var("LISTD_BIND").unwrap_or_else(|_| "127.0.0.1:1234".to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let snapshot_interval = match std::env::var("LISTD_SNAPSHOT_INTERVAL_SECS") {
            Ok(raw) => parse_interval(&raw)?,
            Err(_) => Duration::from_secs(10),
        };

        Ok(Self {
            home,
            bind,
            snapshot_interval,
        })
    }
}

/// Parse a positive number of seconds.
pub fn parse_interval(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidSnapshotInterval(raw.to_string())),
    }
}
