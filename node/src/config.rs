//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::NodeError;

/// Configuration for a keel node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default so a
/// partial file works.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Chain name, embedded in the genesis.
    #[serde(default = "default_chain")]
    pub chain: String,

    /// Initial owner balance minted at genesis creation (bootstrap only).
    #[serde(default = "default_initial_balance")]
    pub initial_balance: u64,

    /// Directory for encrypted account files.
    #[serde(default = "default_key_store_dir")]
    pub key_store_dir: PathBuf,

    /// Directory for the genesis file and the block log.
    #[serde(default = "default_block_store_dir")]
    pub block_store_dir: PathBuf,

    /// This node's P2P listen address.
    #[serde(default = "default_node_addr")]
    pub node_addr: String,

    /// The RPC server's listen address.
    #[serde(default = "default_rpc_addr")]
    pub rpc_addr: String,

    /// Bootstrap nodes create the genesis and accept peer registrations.
    #[serde(default)]
    pub bootstrap: bool,

    /// Seed peer contacted on startup (non-bootstrap nodes).
    #[serde(default)]
    pub seed_addr: String,

    /// Password protecting the authority key. Holding this key enables the
    /// block proposer.
    #[serde(default)]
    pub authority_pass: String,

    /// Password protecting the owner key created at genesis.
    #[serde(default)]
    pub owner_pass: String,

    /// Upper bound of the randomized block proposal interval, in seconds.
    #[serde(default = "default_max_period_secs")]
    pub max_period_secs: u64,

    /// Capacity of each relay's inbound channel.
    #[serde(default = "default_relay_buf")]
    pub relay_buf: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_chain() -> String {
    "keel-dev".to_string()
}

fn default_initial_balance() -> u64 {
    1_000_000
}

fn default_key_store_dir() -> PathBuf {
    PathBuf::from("./keel_data/keystore")
}

fn default_block_store_dir() -> PathBuf {
    PathBuf::from("./keel_data/blocks")
}

fn default_node_addr() -> String {
    "127.0.0.1:17000".to_string()
}

fn default_rpc_addr() -> String {
    "127.0.0.1:17080".to_string()
}

fn default_max_period_secs() -> u64 {
    10
}

fn default_relay_buf() -> usize {
    100
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            initial_balance: default_initial_balance(),
            key_store_dir: default_key_store_dir(),
            block_store_dir: default_block_store_dir(),
            node_addr: default_node_addr(),
            rpc_addr: default_rpc_addr(),
            bootstrap: false,
            seed_addr: String::new(),
            authority_pass: String::new(),
            owner_pass: String::new(),
            max_period_secs: default_max_period_secs(),
            relay_buf: default_relay_buf(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
