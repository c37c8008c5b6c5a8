//! keel daemon — entry point for running a keel node.

use clap::Parser;
use std::path::PathBuf;

use keel_node::{init_logging, LogFormat, Node, NodeConfig};

#[derive(Parser)]
#[command(name = "keel-daemon", about = "keel single-authority chain node")]
struct Cli {
    /// Chain name embedded in the genesis (bootstrap nodes).
    #[arg(long, env = "KEEL_CHAIN")]
    chain: Option<String>,

    /// Initial owner balance minted at genesis creation.
    #[arg(long, env = "KEEL_INITIAL_BALANCE")]
    initial_balance: Option<u64>,

    /// Directory for encrypted account files.
    #[arg(long, env = "KEEL_KEYSTORE_DIR")]
    key_store_dir: Option<PathBuf>,

    /// Directory for the genesis file and block log.
    #[arg(long, env = "KEEL_BLOCKSTORE_DIR")]
    block_store_dir: Option<PathBuf>,

    /// P2P listen address ("ip:port").
    #[arg(long, env = "KEEL_NODE_ADDR")]
    node_addr: Option<String>,

    /// RPC listen address ("ip:port").
    #[arg(long, env = "KEEL_RPC_ADDR")]
    rpc_addr: Option<String>,

    /// Run as the bootstrap node: create the genesis and accept peer
    /// registrations.
    #[arg(long, env = "KEEL_BOOTSTRAP")]
    bootstrap: bool,

    /// Seed peer to sync from on startup.
    #[arg(long, env = "KEEL_SEED_ADDR")]
    seed_addr: Option<String>,

    /// Password protecting the authority key (enables the block proposer).
    #[arg(long, env = "KEEL_AUTHORITY_PASS")]
    authority_pass: Option<String>,

    /// Password protecting the owner key created at genesis.
    #[arg(long, env = "KEEL_OWNER_PASS")]
    owner_pass: Option<String>,

    /// Upper bound of the randomized proposal interval, in seconds.
    #[arg(long, env = "KEEL_MAX_PERIOD_SECS")]
    max_period_secs: Option<u64>,

    /// Log format: "human" or "json".
    #[arg(long, env = "KEEL_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "KEEL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. File settings are the base; CLI
    /// flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<NodeConfig> {
        let mut cfg = match &self.config {
            Some(path) => NodeConfig::from_toml_file(
                path.to_str()
                    .ok_or_else(|| anyhow::anyhow!("config path is not valid UTF-8"))?,
            )?,
            None => NodeConfig::default(),
        };

        if let Some(chain) = self.chain {
            cfg.chain = chain;
        }
        if let Some(balance) = self.initial_balance {
            cfg.initial_balance = balance;
        }
        if let Some(dir) = self.key_store_dir {
            cfg.key_store_dir = dir;
        }
        if let Some(dir) = self.block_store_dir {
            cfg.block_store_dir = dir;
        }
        if let Some(addr) = self.node_addr {
            cfg.node_addr = addr;
        }
        if let Some(addr) = self.rpc_addr {
            cfg.rpc_addr = addr;
        }
        if self.bootstrap {
            cfg.bootstrap = true;
        }
        if let Some(seed) = self.seed_addr {
            cfg.seed_addr = seed;
        }
        if let Some(pass) = self.authority_pass {
            cfg.authority_pass = pass;
        }
        if let Some(pass) = self.owner_pass {
            cfg.owner_pass = pass;
        }
        if let Some(secs) = self.max_period_secs {
            cfg.max_period_secs = secs;
        }
        if let Some(format) = self.log_format {
            cfg.log_format = format;
        }
        if let Some(level) = self.log_level {
            cfg.log_level = level;
        }
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = cli.into_config()?;

    init_logging(LogFormat::parse(&cfg.log_format), &cfg.log_level);
    tracing::info!(
        chain = %cfg.chain,
        node_addr = %cfg.node_addr,
        rpc_addr = %cfg.rpc_addr,
        bootstrap = cfg.bootstrap,
        "starting keel node"
    );

    Node::new(cfg).run().await?;
    Ok(())
}
