//! Node wiring: brings every subsystem up, runs until signalled, joins all
//! tasks on the way down.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use keel_chain::{SigBlock, SigGenesis, SigTx};
use keel_crypto::Account;
use keel_network::{spawn_relay, PeerDiscovery, PeerDiscoveryConfig};
use keel_rpc::{RpcServer, RpcState};
use keel_store::BlockStore;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::event_stream::EventStream;
use crate::p2p::P2pServer;
use crate::proposer::BlockProposer;
use crate::shutdown::Shutdown;
use crate::state_sync::StateSync;

/// A keel node.
pub struct Node {
    cfg: NodeConfig,
}

impl Node {
    pub fn new(cfg: NodeConfig) -> Self {
        Self { cfg }
    }

    /// Synchronize state, start every subsystem, and run until SIGINT or
    /// SIGTERM. All background tasks are joined before returning.
    pub async fn run(self) -> Result<(), NodeError> {
        let cfg = self.cfg;
        let shutdown = Shutdown::new();

        let store = BlockStore::new(&cfg.block_store_dir);
        let peers = Arc::new(PeerDiscovery::new(PeerDiscoveryConfig {
            node_addr: cfg.node_addr.clone(),
            bootstrap: cfg.bootstrap,
            seed_addrs: vec![cfg.seed_addr.clone()],
        }));

        let sync = StateSync::new(cfg.clone(), store.clone(), Arc::clone(&peers));
        let (state, sgen) = sync.sync_state().await?;

        let events = Arc::new(EventStream::new());
        let (tx_relay, tx_relay_task) =
            spawn_relay::<SigTx>(cfg.relay_buf, false, Arc::clone(&peers), shutdown.subscribe());
        let (block_relay, block_relay_task) = spawn_relay::<SigBlock>(
            cfg.relay_buf,
            false,
            Arc::clone(&peers),
            shutdown.subscribe(),
        );

        let mut tasks: Vec<JoinHandle<()>> = vec![tx_relay_task, block_relay_task];

        // P2P wire server.
        let p2p = Arc::new(P2pServer::new(
            cfg.node_addr.clone(),
            state.clone(),
            store.clone(),
            Arc::clone(&peers),
            Arc::clone(&events),
            tx_relay.clone(),
            block_relay.clone(),
        ));
        let p2p_shutdown = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = p2p.serve(p2p_shutdown).await {
                tracing::error!(error = %e, "P2P server failed");
            }
        }));

        // Peer discovery refresh loop.
        tasks.push(tokio::spawn(
            Arc::clone(&peers).run(shutdown.subscribe()),
        ));

        // Block proposer, only when this node holds the authority key.
        match load_authority(&cfg, &sgen) {
            Some(authority) => {
                let proposer = BlockProposer::new(
                    authority,
                    state.clone(),
                    store.clone(),
                    Arc::clone(&events),
                    block_relay.clone(),
                    Duration::from_secs(cfg.max_period_secs),
                );
                tasks.push(tokio::spawn(proposer.run(shutdown.subscribe())));
            }
            None => {
                tracing::info!("authority key not available, block proposer disabled");
            }
        }

        // RPC server.
        let rpc_state = RpcState {
            key_store_dir: cfg.key_store_dir.clone(),
            block_store: store.clone(),
            balance_checker: Arc::new(state.clone()),
            tx_applier: Arc::new(state.clone()),
            tx_relay: tx_relay.clone(),
        };
        let rpc = RpcServer::new(cfg.rpc_addr.clone(), rpc_state);
        let rpc_shutdown = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = rpc.serve(rpc_shutdown).await {
                tracing::error!(error = %e, "RPC server failed");
            }
        }));

        shutdown.wait_for_interrupt().await;

        for task in tasks {
            let _ = task.await;
        }
        tracing::info!("node stopped");
        Ok(())
    }
}

/// Load the authority account from the keystore, if this node has the
/// password for it. The proposer runs exactly when this returns `Some`.
fn load_authority(cfg: &NodeConfig, sgen: &SigGenesis) -> Option<Account> {
    if cfg.authority_pass.is_empty() {
        return None;
    }
    let path = cfg
        .key_store_dir
        .join(sgen.genesis.authority.to_string());
    match Account::read_from_file(&path, cfg.authority_pass.as_bytes()) {
        Ok(account) if account.address() == sgen.genesis.authority => Some(account),
        Ok(account) => {
            tracing::warn!(
                found = %account.address(),
                expected = %sgen.genesis.authority,
                "keystore account does not match the genesis authority"
            );
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to load authority key");
            None
        }
    }
}
