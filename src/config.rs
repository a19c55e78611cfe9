//! Node Configuration
//!
//! The node is configured from three sources, merged once at startup into an
//! immutable [`NodeConfig`] that every component receives explicitly:
//!
//! - **CLI flags** (see [`crate::cli`]): identity, data directory, feature toggles.
//! - **TOML file** (`server.toml` by default): storage limit, replication threshold `k`
//!   and peer-call timeout.
//! - **Server list file**: bootstrap peer addresses, one `host:port` per line.

use crate::error::ConfigError;
use crate::metadata::types::PeerOrder;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_STORAGE_LIMIT: u64 = 1024 * 1024 * 1024;
pub const DEFAULT_REPLICATION_THRESHOLD: usize = 2;
pub const DEFAULT_PEER_TIMEOUT_MS: u64 = 500;

const UPLOAD_DIR: &str = "uploaded";
const LOG_DIR: &str = "logs";
const METADATA_FILE: &str = "metadata.json";

/// On-disk TOML layout.
///
/// ```toml
/// [generic]
/// storage_limit = 1073741824
///
/// [distributed_replication]
/// k = 2
///
/// [peer]
/// timeout_ms = 500
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub generic: GenericSection,
    #[serde(default)]
    pub distributed_replication: ReplicationSection,
    #[serde(default)]
    pub peer: PeerSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenericSection {
    #[serde(default = "default_storage_limit")]
    pub storage_limit: u64,
}

impl Default for GenericSection {
    fn default() -> Self {
        Self {
            storage_limit: DEFAULT_STORAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplicationSection {
    #[serde(default = "default_threshold")]
    pub k: usize,
}

impl Default for ReplicationSection {
    fn default() -> Self {
        Self {
            k: DEFAULT_REPLICATION_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerSection {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PeerSection {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
        }
    }
}

fn default_storage_limit() -> u64 {
    DEFAULT_STORAGE_LIMIT
}

fn default_threshold() -> usize {
    DEFAULT_REPLICATION_THRESHOLD
}

fn default_timeout_ms() -> u64 {
    DEFAULT_PEER_TIMEOUT_MS
}

/// Loads the TOML config file.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<FileConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}

/// Parses the bootstrap server list: one address per line, blank lines,
/// `#` comments, duplicates and our own address dropped.
pub fn parse_server_list(contents: &str, local_address: &str) -> Vec<String> {
    let mut servers: Vec<String> = Vec::new();
    for line in contents.lines() {
        let server = line.trim();
        if server.is_empty() || server.starts_with('#') || server == local_address {
            continue;
        }
        if !servers.iter().any(|s| s == server) {
            servers.push(server.to_string());
        }
    }
    servers
}

/// Settings for load-triggered replication, present only when the mode is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationSettings {
    /// Concurrent reads of one file at or above which placement is considered.
    pub threshold: usize,
}

/// Immutable per-process configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This node's own `host:port`, used as its identity in holder records.
    pub address: String,
    pub storage_limit: u64,
    /// `None` when distributed replication is disabled.
    pub replication: Option<ReplicationSettings>,
    pub peer_timeout: Duration,
    pub peer_order: PeerOrder,
    pub data_dir: PathBuf,
}

impl NodeConfig {
    pub fn new(address: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            address: address.into(),
            storage_limit: DEFAULT_STORAGE_LIMIT,
            replication: None,
            peer_timeout: Duration::from_millis(DEFAULT_PEER_TIMEOUT_MS),
            peer_order: PeerOrder::Registration,
            data_dir: data_dir.into(),
        }
    }

    pub fn with_storage_limit(mut self, storage_limit: u64) -> Self {
        self.storage_limit = storage_limit;
        self
    }

    pub fn with_replication(mut self, threshold: usize) -> Self {
        self.replication = Some(ReplicationSettings { threshold });
        self
    }

    pub fn with_peer_order(mut self, order: PeerOrder) -> Self {
        self.peer_order = order;
        self
    }

    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    /// Folds the file section into a config built from CLI identity.
    pub fn apply_file(mut self, file: &FileConfig, use_dist_replication: bool) -> Result<Self, ConfigError> {
        if use_dist_replication && file.distributed_replication.k == 0 {
            return Err(ConfigError::Invalid(
                "distributed_replication.k must be at least 1".to_string(),
            ));
        }
        self.storage_limit = file.generic.storage_limit;
        self.peer_timeout = Duration::from_millis(file.peer.timeout_ms);
        self.replication = use_dist_replication.then_some(ReplicationSettings {
            threshold: file.distributed_replication.k,
        });
        Ok(self)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOAD_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }
}
