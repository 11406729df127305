use crate::state::MergePolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Complete shardweave configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub shards: ShardsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// State registry configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub merge_policy: MergePolicy,
}

/// Notification broadcast configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Notifications buffered per subscriber before it starts lagging
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_broadcast_capacity() -> usize {
    1000
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Shards this process runs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShardsConfig {
    /// Shard ids; empty runs the single implicit shard
    #[serde(default)]
    pub ids: Vec<u32>,
}

impl ShardsConfig {
    /// Shard keys to start, in order
    pub fn shard_keys(&self) -> Vec<Option<u32>> {
        if self.ids.is_empty() {
            vec![None]
        } else {
            self.ids.iter().copied().map(Some).collect()
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "shardweave=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}
