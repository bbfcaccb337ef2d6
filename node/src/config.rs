//! Node configuration with TOML file support.

use crate::NodeError;
use cobalt_types::NetworkId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a cobalt node. Loadable from TOML or built
/// programmatically for tests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Which network to join.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Data directory for the ledger store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// P2P listening port; 0 means the network profile default.
    #[serde(default)]
    pub port: u16,

    #[serde(default = "default_max_peers")]
    pub max_peers: usize,

    /// Accept loopback/private peers (dev networks).
    #[serde(default)]
    pub allow_local_peers: bool,

    /// Vote with the local representative key.
    #[serde(default)]
    pub enable_voting: bool,

    /// Outbound bandwidth cap in bytes/second; 0 disables the limiter.
    #[serde(default = "default_bandwidth_limit")]
    pub bandwidth_limit: u64,

    /// Blocks applied per write transaction before it is recycled.
    #[serde(default = "default_batch_size")]
    pub block_processor_batch_size: usize,

    /// Soft wall-clock cap on one write transaction, in milliseconds.
    #[serde(default = "default_batch_max_time_ms")]
    pub block_processor_batch_max_time_ms: u64,

    /// State blocks per signature-verification batch.
    #[serde(default = "default_verification_size")]
    pub block_processor_verification_size: usize,

    /// Ingress backlog above which `full()` reports back-pressure.
    #[serde(default = "default_full_threshold")]
    pub block_processor_full_threshold: usize,

    /// Uncemented backlog above which cementing switches to the unbounded
    /// walker.
    #[serde(default = "default_unbounded_cutoff")]
    pub confirmation_height_unbounded_cutoff: u64,

    /// Account updates flushed per cementing write.
    #[serde(default = "default_batch_write_size")]
    pub confirmation_height_batch_write_size: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_network() -> NetworkId {
    NetworkId::Dev
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./cobalt_data")
}

fn default_max_peers() -> usize {
    cobalt_network::MAX_PEERS
}

fn default_bandwidth_limit() -> u64 {
    10 * 1024 * 1024
}

fn default_batch_size() -> usize {
    1024
}

fn default_batch_max_time_ms() -> u64 {
    500
}

fn default_verification_size() -> usize {
    256
}

fn default_full_threshold() -> usize {
    65_536
}

fn default_unbounded_cutoff() -> u64 {
    16_384
}

fn default_batch_write_size() -> usize {
    4096
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

impl NodeConfig {
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// The effective listening port.
    pub fn effective_port(&self) -> u16 {
        if self.port != 0 {
            self.port
        } else {
            cobalt_types::NetworkProfile::for_network(self.network).default_port
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config populates every default")
    }
}
