//! Authority-only block proposal loop.
//!
//! Waits a random duration uniformly in `[max_period / 2, max_period]`,
//! drains the pending pool into a candidate block, validates it on a clone,
//! commits, persists, publishes events, and relays. Every failure is
//! log-and-continue; the loop only exits on shutdown.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;

use keel_chain::{ChainError, SharedState, SigBlock};
use keel_crypto::Account;
use keel_network::RelayHandle;
use keel_store::BlockStore;

use crate::event_stream::EventStream;

/// The block proposal loop, run only by the node holding the authority key.
pub struct BlockProposer {
    authority: Account,
    state: SharedState,
    store: BlockStore,
    events: Arc<EventStream>,
    block_relay: RelayHandle<SigBlock>,
    max_period: Duration,
}

impl BlockProposer {
    pub fn new(
        authority: Account,
        state: SharedState,
        store: BlockStore,
        events: Arc<EventStream>,
        block_relay: RelayHandle<SigBlock>,
        max_period: Duration,
    ) -> Self {
        Self {
            authority,
            state,
            store,
            events,
            block_relay,
            max_period,
        }
    }

    /// Random wait uniformly in `[max_period / 2, max_period]`.
    fn rand_period(&self) -> Duration {
        let max = self.max_period.as_millis().max(2) as u64;
        let span = rand::thread_rng().gen_range(0..=max / 2);
        Duration::from_millis(max / 2 + span)
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(authority = %self.authority.address(), "block proposer started");
        loop {
            let period = self.rand_period();
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("block proposer shutting down");
                    break;
                }
                _ = tokio::time::sleep(period) => {
                    self.propose_once().await;
                }
            }
        }
    }

    /// One proposal round. Skips quietly when the pending pool is empty.
    async fn propose_once(&self) {
        let sblk = match self.state.create_block(&self.authority) {
            Ok(blk) => blk,
            Err(ChainError::NothingToPropose) => return,
            Err(e) => {
                tracing::warn!(error = %e, "block assembly failed");
                return;
            }
        };

        // Same order as the receive path: validate-and-commit, persist,
        // publish, relay.
        if let Err(e) = self.state.apply_block(&sblk) {
            tracing::warn!(error = %e, "proposed block failed validation");
            return;
        }
        if let Err(e) = self.store.write_block(&sblk) {
            tracing::error!(error = %e, "failed to persist proposed block");
            return;
        }
        self.events.publish_block(&sblk);

        tracing::info!(
            number = sblk.block.number,
            txs = sblk.block.txs.len(),
            hash = %sblk.hash(),
            "block proposed"
        );
        self.block_relay.relay(sblk).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_chain::{Genesis, State, Tx};
    use keel_network::{spawn_relay, PeerDiscovery, PeerDiscoveryConfig};

    fn proposer_fixture(dir: &std::path::Path) -> (BlockProposer, SharedState, Account, Account) {
        let authority = Account::generate();
        let owner = Account::generate();
        let sgen = Genesis::new("testnet", authority.address(), owner.address(), 1000)
            .sign(&authority)
            .unwrap();
        let shared = SharedState::new(State::new(&sgen));

        let store = BlockStore::new(dir);
        store.init().unwrap();

        let peers = Arc::new(PeerDiscovery::new(PeerDiscoveryConfig {
            node_addr: String::new(),
            bootstrap: true,
            seed_addrs: Vec::new(),
        }));
        let (shutdown_tx, _) = broadcast::channel(1);
        let (block_relay, _task) =
            spawn_relay::<SigBlock>(16, false, peers, shutdown_tx.subscribe());

        // Round-trip the authority through the keystore the way the node
        // does at startup.
        let key_path = authority.write_to_dir(dir, b"authpass").unwrap();
        let loaded = Account::read_from_file(&key_path, b"authpass").unwrap();

        let proposer = BlockProposer::new(
            loaded,
            shared.clone(),
            store,
            Arc::new(EventStream::new()),
            block_relay,
            Duration::from_millis(20),
        );
        (proposer, shared, authority, owner)
    }

    #[tokio::test]
    async fn rand_period_stays_in_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let (proposer, _, _, _) = proposer_fixture(dir.path());
        for _ in 0..100 {
            let p = proposer.rand_period();
            assert!(p >= Duration::from_millis(10));
            assert!(p <= Duration::from_millis(20));
        }
    }

    #[tokio::test]
    async fn empty_pool_proposes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (proposer, shared, _, _) = proposer_fixture(dir.path());
        proposer.propose_once().await;
        assert_eq!(shared.last_block_number(), 0);
    }

    #[tokio::test]
    async fn pending_tx_becomes_a_block() {
        let dir = tempfile::tempdir().unwrap();
        let (proposer, shared, _authority, owner) = proposer_fixture(dir.path());

        let to = Account::generate().address();
        let stx = Tx::new(owner.address(), to, 100, 1).sign(&owner).unwrap();
        shared.apply_tx(stx).unwrap();

        proposer.propose_once().await;

        assert_eq!(shared.last_block_number(), 1);
        assert_eq!(shared.balance(&to), Some(100));
        assert_eq!(shared.pending_len(), 0);

        // The block also landed in the store.
        let store = BlockStore::new(dir.path());
        assert_eq!(store.read_blocks().unwrap().count(), 1);
    }
}
