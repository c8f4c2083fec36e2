//! Process configuration for the `cold-exporter` binary
//!
//! Environment:
//! - TIERED_DATA_DIR: root for hot and cold data (default `data`)
//! - TIERED_HTTP_ADDR: ops HTTP listen address (default `127.0.0.1:8090`)
//! - TIERED_SERVICE_IDS: comma-separated services to export (default `default`)
//! - COLD_ENABLED: `true`/`false` (default false)
//! - COLD_PULL_INTERVAL_SECS, COLD_SAFE_WINDOW_SECS
//! - COLD_SEGMENT_MAX_EVENTS, COLD_SEGMENT_MAX_BYTES

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::cold::{ColdEventStoreOptions, DEFAULT_SERVICE_ID};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub http_addr: SocketAddr,
    pub service_ids: Vec<String>,
    pub cold: ColdEventStoreOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8090)),
            service_ids: vec![DEFAULT_SERVICE_ID.to_string()],
            cold: ColdEventStoreOptions::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset variables keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("TIERED_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = parse_var(&lookup, "TIERED_HTTP_ADDR")? {
            config.http_addr = addr;
        }
        if let Some(ids) = lookup("TIERED_SERVICE_IDS") {
            config.service_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(enabled) = parse_var(&lookup, "COLD_ENABLED")? {
            config.cold.enabled = enabled;
        }
        if let Some(secs) = parse_var(&lookup, "COLD_PULL_INTERVAL_SECS")? {
            config.cold.pull_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "COLD_SAFE_WINDOW_SECS")? {
            config.cold.safe_window = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var(&lookup, "COLD_SEGMENT_MAX_EVENTS")? {
            config.cold.segment_max_events = max;
        }
        if let Some(max) = parse_var(&lookup, "COLD_SEGMENT_MAX_BYTES")? {
            config.cold.segment_max_bytes = max;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_ids.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one service id is required".to_string(),
            ));
        }
        self.cold
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Hot tier directory
    pub fn hot_dir(&self) -> PathBuf {
        self.data_dir.join("hot")
    }

    /// Root of the filesystem object storage
    pub fn cold_dir(&self) -> PathBuf {
        self.data_dir.join("cold")
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
