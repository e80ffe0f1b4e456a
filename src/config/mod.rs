/// Configuration management for the Ruleway engine
///
/// Handles interpreter limits, checkpoint storage and log filtering.

use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Main application configuration. Missing sections and keys take the
/// environment-backed defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Interpreter configuration
    pub engine: EngineConfig,
    /// Checkpoint storage configuration
    pub storage: StorageConfig,
    /// Log output configuration
    pub logging: LoggingConfig,
}

/// Limits applied to every workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Node executions allowed per run before it fails (default: 200)
    pub max_iterations: usize,
    /// Hard timeout for one external service call, in seconds (default: 30)
    pub service_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// SQLite file for checkpoints; in-memory checkpoints when unset
    pub checkpoint_db: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
}

pub const DEFAULT_MAX_ITERATIONS: usize = 200;
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 30;

impl EngineConfig {
    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: env_parse("RULEWAY_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS),
            service_timeout_secs: env_parse("RULEWAY_SERVICE_TIMEOUT_SECS", DEFAULT_SERVICE_TIMEOUT_SECS),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: std::env::var("RULEWAY_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            storage: StorageConfig {
                checkpoint_db: std::env::var("RULEWAY_CHECKPOINT_DB").ok().filter(|s| !s.is_empty()),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
