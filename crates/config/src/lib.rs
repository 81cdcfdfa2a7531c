//! Configuration schema and loader for the tablet coordinator.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tablets_common::{KeyHash, LogPosition, ServerId, TableId};
use tablets_directory::{Tablet, TabletStatus};

/// Top-level coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Directory settings.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// The server list used to resolve locators.
    #[serde(default)]
    pub servers: Vec<ServerEntry>,

    /// Tablets to seed the directory with, in order.
    #[serde(default)]
    pub tablets: Vec<TabletEntry>,

    /// Splits applied after seeding, in order.
    #[serde(default)]
    pub splits: Vec<SplitEntry>,

    /// Snapshot output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Tablets to reserve room for up front.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    /// `"<index>.<generation>"`.
    pub id: ServerId,
    /// Service locator clients dial, e.g. `tcp:host=one,port=11100`.
    pub locator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabletEntry {
    pub table_id: TableId,
    pub start_key_hash: KeyHash,
    pub end_key_hash: KeyHash,
    /// Owning server, `"<index>.<generation>"`.
    pub server: ServerId,
    #[serde(default = "default_status")]
    pub status: TabletStatus,
    #[serde(default)]
    pub ctime: LogPosition,
}

impl TabletEntry {
    pub fn to_tablet(&self) -> Tablet {
        Tablet::new(
            self.table_id,
            self.start_key_hash,
            self.end_key_hash,
            self.server,
            self.status,
            self.ctime,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitEntry {
    pub table_id: TableId,
    pub start_key_hash: KeyHash,
    pub end_key_hash: KeyHash,
    pub split_key_hash: KeyHash,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print the snapshot JSON.
    #[serde(default)]
    pub pretty: bool,

    /// Print Prometheus metrics to stderr after the snapshot.
    #[serde(default)]
    pub metrics: bool,
}

// --- Defaults ---

fn default_initial_capacity() -> usize {
    64
}
fn default_status() -> TabletStatus {
    TabletStatus::Normal
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl CoordinatorConfig {
    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut servers = HashSet::new();
        for (i, server) in self.servers.iter().enumerate() {
            if !servers.insert(server.id) {
                return Err(ConfigError::Invalid(format!(
                    "servers[{}].id {} is listed more than once",
                    i, server.id
                )));
            }
            if server.locator.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "servers[{}].locator must not be empty",
                    i
                )));
            }
        }

        let mut keys = HashSet::new();
        for (i, tablet) in self.tablets.iter().enumerate() {
            if tablet.start_key_hash > tablet.end_key_hash {
                return Err(ConfigError::Invalid(format!(
                    "tablets[{}].start_key_hash ({}) must be <= end_key_hash ({})",
                    i, tablet.start_key_hash, tablet.end_key_hash
                )));
            }
            if !servers.contains(&tablet.server) {
                return Err(ConfigError::Invalid(format!(
                    "tablets[{}].server {} is not in servers",
                    i, tablet.server
                )));
            }
            if !keys.insert((tablet.table_id, tablet.start_key_hash, tablet.end_key_hash)) {
                return Err(ConfigError::Invalid(format!(
                    "tablets[{}] duplicates table {} range [{}, {}]",
                    i, tablet.table_id, tablet.start_key_hash, tablet.end_key_hash
                )));
            }
        }
        Ok(())
    }
}

/// Load a `CoordinatorConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<CoordinatorConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Load a `CoordinatorConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<CoordinatorConfig, ConfigError> {
    let config: CoordinatorConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}
