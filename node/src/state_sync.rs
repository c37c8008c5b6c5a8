//! Startup state synchronization.
//!
//! Establishes the genesis (local read, bootstrap creation, or fetch from a
//! seed peer), replays the local block log into a fresh state, and catches
//! up from peers. Replay of the local store is strict: a state-invariant
//! violation there means local corruption and the node refuses to start.

use std::sync::Arc;

use keel_chain::{verify_genesis, SharedState, SigGenesis, State};
use keel_crypto::Account;
use keel_network::{connect, read_frame, request, write_frame, READ_TIMEOUT};
use keel_network::{NetworkError, PeerDiscovery, WireMessage};
use keel_store::{BlockStore, StoreError};

use crate::config::NodeConfig;
use crate::error::NodeError;

/// Minimum accepted password length for genesis account creation.
const MIN_PASSWORD_LEN: usize = 5;

/// Startup synchronization pipeline.
pub struct StateSync {
    cfg: NodeConfig,
    store: BlockStore,
    peers: Arc<PeerDiscovery>,
}

impl StateSync {
    pub fn new(cfg: NodeConfig, store: BlockStore, peers: Arc<PeerDiscovery>) -> Self {
        Self { cfg, store, peers }
    }

    /// Run the full pipeline: genesis → verify → replay → peer catch-up.
    pub async fn sync_state(&self) -> Result<(SharedState, SigGenesis), NodeError> {
        let sgen = match self.store.read_genesis() {
            Ok(gen) => gen,
            Err(StoreError::GenesisNotFound) => {
                if self.cfg.bootstrap {
                    self.create_genesis()?
                } else {
                    self.sync_genesis().await?
                }
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_genesis(&sgen) {
            return Err(NodeError::InvalidGenesis);
        }

        let mut state = State::new(&sgen);
        self.store.init()?;
        self.replay_local_blocks(&mut state)?;

        let shared = SharedState::new(state);
        self.sync_blocks(&shared).await?;

        tracing::info!(
            chain = %sgen.genesis.chain,
            block = shared.last_block_number(),
            "state synchronized"
        );
        Ok((shared, sgen))
    }

    /// Create, sign, and persist a fresh genesis (bootstrap nodes only).
    ///
    /// Generates the authority and owner accounts and writes both to the
    /// keystore; the owner receives the configured initial balance.
    fn create_genesis(&self) -> Result<SigGenesis, NodeError> {
        if self.cfg.authority_pass.len() < MIN_PASSWORD_LEN {
            return Err(NodeError::Config(format!(
                "authority password must be at least {MIN_PASSWORD_LEN} bytes"
            )));
        }
        if self.cfg.owner_pass.len() < MIN_PASSWORD_LEN {
            return Err(NodeError::Config(format!(
                "owner password must be at least {MIN_PASSWORD_LEN} bytes"
            )));
        }
        if self.cfg.initial_balance == 0 {
            return Err(NodeError::Config(
                "initial balance must be greater than 0".to_string(),
            ));
        }

        let authority = Account::generate();
        authority.write_to_dir(&self.cfg.key_store_dir, self.cfg.authority_pass.as_bytes())?;
        let owner = Account::generate();
        owner.write_to_dir(&self.cfg.key_store_dir, self.cfg.owner_pass.as_bytes())?;

        let gen = keel_chain::Genesis::new(
            &self.cfg.chain,
            authority.address(),
            owner.address(),
            self.cfg.initial_balance,
        );
        let sgen = gen.sign(&authority)?;
        self.store.write_genesis(&sgen)?;

        tracing::info!(
            chain = %self.cfg.chain,
            authority = %authority.address(),
            owner = %owner.address(),
            balance = self.cfg.initial_balance,
            "genesis created"
        );
        Ok(sgen)
    }

    /// Fetch the genesis from a seed peer, verify, and persist it.
    async fn sync_genesis(&self) -> Result<SigGenesis, NodeError> {
        for peer in self.peers.peers() {
            match request(&peer, &WireMessage::GenesisRequest).await {
                Ok(WireMessage::Genesis(sgen)) => {
                    if !verify_genesis(&sgen) {
                        return Err(NodeError::InvalidGenesis);
                    }
                    self.store.write_genesis(&sgen)?;
                    tracing::info!(peer = %peer, chain = %sgen.genesis.chain, "genesis synced");
                    return Ok(sgen);
                }
                Ok(other) => {
                    tracing::warn!(peer = %peer, ?other, "unexpected genesis response");
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "genesis fetch failed");
                }
            }
        }
        Err(NodeError::GenesisUnavailable(
            "no peer answered the genesis request".to_string(),
        ))
    }

    /// Replay every block in the local store through the clone/apply cycle.
    /// Any failure is fatal.
    fn replay_local_blocks(&self, state: &mut State) -> Result<(), NodeError> {
        let mut replayed = 0u64;
        for result in self.store.read_blocks()? {
            let sblk = result?;
            let mut clone = state.clone();
            clone.apply_block(&sblk)?;
            state.apply(clone);
            replayed += 1;
        }
        if replayed > 0 {
            tracing::info!(blocks = replayed, "local block log replayed");
        }
        Ok(())
    }

    /// Stream blocks past our tip from each peer, validate, apply, and
    /// persist them. Peer connectivity failures skip to the next peer;
    /// a block that fails validation is fatal for the sync.
    async fn sync_blocks(&self, shared: &SharedState) -> Result<(), NodeError> {
        for peer in self.peers.peers() {
            if let Err(e) = self.sync_blocks_from(&peer, shared).await {
                match e {
                    NodeError::Network(_) | NodeError::Io(_) => {
                        tracing::warn!(peer = %peer, error = %e, "block sync from peer failed");
                    }
                    fatal => return Err(fatal),
                }
            }
        }
        Ok(())
    }

    async fn sync_blocks_from(&self, peer: &str, shared: &SharedState) -> Result<(), NodeError> {
        let from_number = shared.last_block_number() + 1;
        let mut stream = connect(peer).await?;
        write_frame(&mut stream, &WireMessage::BlockSyncRequest { from_number }).await?;

        let mut received = 0u64;
        loop {
            match read_frame(&mut stream, READ_TIMEOUT).await? {
                None => break,
                Some(WireMessage::Block(sblk)) => {
                    shared.apply_block(&sblk)?;
                    self.store.write_block(&sblk)?;
                    received += 1;
                }
                Some(other) => {
                    tracing::warn!(peer = %peer, ?other, "unexpected block sync frame");
                    return Err(NodeError::Network(NetworkError::UnexpectedEof));
                }
            }
        }
        if received > 0 {
            tracing::info!(peer = %peer, blocks = received, "blocks synced from peer");
        }
        Ok(())
    }
}
