//! Integration tests for the startup sync pipeline: genesis bootstrap,
//! local replay, and full catch-up from a seed peer over the wire.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use keel_chain::{SharedState, SigBlock, SigGenesis, SigTx, Tx};
use keel_crypto::Account;
use keel_network::{spawn_relay, PeerDiscovery, PeerDiscoveryConfig};
use keel_node::{EventStream, NodeConfig, NodeError, P2pServer, StateSync};
use keel_store::BlockStore;

fn node_config(dir: &std::path::Path, bootstrap: bool, seed_addr: &str) -> NodeConfig {
    NodeConfig {
        chain: "keel-test".to_string(),
        initial_balance: 1000,
        key_store_dir: dir.join("keystore"),
        block_store_dir: dir.join("blocks"),
        node_addr: String::new(),
        seed_addr: seed_addr.to_string(),
        bootstrap,
        authority_pass: "authpass".to_string(),
        owner_pass: "ownerpass".to_string(),
        ..NodeConfig::default()
    }
}

fn discovery_for(cfg: &NodeConfig) -> Arc<PeerDiscovery> {
    Arc::new(PeerDiscovery::new(PeerDiscoveryConfig {
        node_addr: cfg.node_addr.clone(),
        bootstrap: cfg.bootstrap,
        seed_addrs: vec![cfg.seed_addr.clone()],
    }))
}

/// Load the authority and owner accounts back out of a bootstrap node's
/// keystore.
fn load_genesis_accounts(cfg: &NodeConfig, sgen: &SigGenesis) -> (Account, Account) {
    let authority = Account::read_from_file(
        &cfg.key_store_dir.join(sgen.genesis.authority.to_string()),
        cfg.authority_pass.as_bytes(),
    )
    .unwrap();
    let owner_addr = *sgen.genesis.balances.keys().next().unwrap();
    let owner = Account::read_from_file(
        &cfg.key_store_dir.join(owner_addr.to_string()),
        cfg.owner_pass.as_bytes(),
    )
    .unwrap();
    (authority, owner)
}

/// Produce and persist `count` single-tx blocks from the owner.
fn grow_chain(
    state: &SharedState,
    store: &BlockStore,
    authority: &Account,
    owner: &Account,
    to: &Account,
    count: u64,
) -> Vec<SigBlock> {
    let mut blocks = Vec::new();
    for _ in 0..count {
        let nonce = state.nonce(&owner.address()) + 1;
        let stx = Tx::new(owner.address(), to.address(), 10, nonce)
            .sign(owner)
            .unwrap();
        state.apply_tx(stx).unwrap();
        let sblk = state.create_block(authority).unwrap();
        state.apply_block(&sblk).unwrap();
        store.write_block(&sblk).unwrap();
        blocks.push(sblk);
    }
    blocks
}

#[tokio::test]
async fn bootstrap_creates_genesis_and_keystore() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = node_config(dir.path(), true, "");
    let store = BlockStore::new(&cfg.block_store_dir);

    let sync = StateSync::new(cfg.clone(), store.clone(), discovery_for(&cfg));
    let (state, sgen) = sync.sync_state().await.unwrap();

    assert!(store.has_genesis());
    assert_eq!(sgen.genesis.chain, "keel-test");
    assert_eq!(state.last_block_number(), 0);

    // Owner got the initial balance; both keys landed in the keystore.
    let owner_addr = *sgen.genesis.balances.keys().next().unwrap();
    assert_eq!(state.balance(&owner_addr), Some(1000));
    let key_files = std::fs::read_dir(&cfg.key_store_dir).unwrap().count();
    assert_eq!(key_files, 2);

    // The genesis accounts decrypt with the configured passwords.
    let (authority, owner) = load_genesis_accounts(&cfg, &sgen);
    assert_eq!(authority.address(), sgen.genesis.authority);
    assert_eq!(owner.address(), owner_addr);
}

#[tokio::test]
async fn bootstrap_rejects_short_passwords_and_zero_balance() {
    let dir = tempfile::tempdir().unwrap();

    let mut cfg = node_config(dir.path(), true, "");
    cfg.authority_pass = "abc".to_string();
    let store = BlockStore::new(&cfg.block_store_dir);
    let sync = StateSync::new(cfg.clone(), store, discovery_for(&cfg));
    assert!(matches!(
        sync.sync_state().await,
        Err(NodeError::Config(_))
    ));

    let mut cfg = node_config(dir.path(), true, "");
    cfg.initial_balance = 0;
    let store = BlockStore::new(&cfg.block_store_dir);
    let sync = StateSync::new(cfg.clone(), store, discovery_for(&cfg));
    assert!(matches!(
        sync.sync_state().await,
        Err(NodeError::Config(_))
    ));
}

#[tokio::test]
async fn restart_replays_local_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = node_config(dir.path(), true, "");
    let store = BlockStore::new(&cfg.block_store_dir);

    let sync = StateSync::new(cfg.clone(), store.clone(), discovery_for(&cfg));
    let (state, sgen) = sync.sync_state().await.unwrap();
    let (authority, owner) = load_genesis_accounts(&cfg, &sgen);
    let receiver = Account::generate();

    grow_chain(&state, &store, &authority, &owner, &receiver, 3);
    assert_eq!(state.last_block_number(), 3);

    // A fresh sync over the same directories reconstructs the same state,
    // nonces included.
    let resync = StateSync::new(cfg.clone(), store.clone(), discovery_for(&cfg));
    let (restored, _) = resync.sync_state().await.unwrap();
    assert_eq!(restored.last_block_number(), 3);
    assert_eq!(restored.last_block_hash(), state.last_block_hash());
    assert_eq!(restored.balance(&owner.address()), Some(970));
    assert_eq!(restored.balance(&receiver.address()), Some(30));
    assert_eq!(restored.nonce(&owner.address()), 3);
}

#[tokio::test]
async fn fresh_node_syncs_from_seed_peer() {
    // Node A: bootstrap, three blocks of history.
    let dir_a = tempfile::tempdir().unwrap();
    let cfg_a = node_config(dir_a.path(), true, "");
    let store_a = BlockStore::new(&cfg_a.block_store_dir);
    let sync_a = StateSync::new(cfg_a.clone(), store_a.clone(), discovery_for(&cfg_a));
    let (state_a, sgen) = sync_a.sync_state().await.unwrap();
    let (authority, owner) = load_genesis_accounts(&cfg_a, &sgen);
    let receiver = Account::generate();
    grow_chain(&state_a, &store_a, &authority, &owner, &receiver, 3);

    // Serve A's wire protocol on an ephemeral port.
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr_a = probe.local_addr().unwrap().to_string();
    drop(probe);

    let peers_a = discovery_for(&cfg_a);
    let (shutdown_tx, _) = broadcast::channel(1);
    let (tx_relay, _t1) = spawn_relay::<SigTx>(16, false, Arc::clone(&peers_a), shutdown_tx.subscribe());
    let (block_relay, _t2) =
        spawn_relay::<SigBlock>(16, false, Arc::clone(&peers_a), shutdown_tx.subscribe());
    let server = Arc::new(P2pServer::new(
        addr_a.clone(),
        state_a.clone(),
        store_a.clone(),
        peers_a,
        Arc::new(EventStream::new()),
        tx_relay,
        block_relay,
    ));
    tokio::spawn(server.serve(shutdown_tx.subscribe()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Node B: empty directories, A as seed.
    let dir_b = tempfile::tempdir().unwrap();
    let mut cfg_b = node_config(dir_b.path(), false, &addr_a);
    cfg_b.authority_pass.clear();
    cfg_b.owner_pass.clear();
    let store_b = BlockStore::new(&cfg_b.block_store_dir);
    let sync_b = StateSync::new(cfg_b.clone(), store_b.clone(), discovery_for(&cfg_b));
    let (state_b, sgen_b) = sync_b.sync_state().await.unwrap();

    // B converged on A's exact state.
    assert_eq!(sgen_b.hash(), sgen.hash());
    assert_eq!(state_b.last_block_number(), 3);
    assert_eq!(state_b.last_block_hash(), state_a.last_block_hash());
    assert_eq!(state_b.balance(&owner.address()), Some(970));
    assert_eq!(state_b.balance(&receiver.address()), Some(30));
    assert_eq!(state_b.nonce(&owner.address()), 3);

    // B persisted the genesis and all three blocks locally.
    assert!(store_b.has_genesis());
    assert_eq!(store_b.read_blocks().unwrap().count(), 3);

    shutdown_tx.send(()).unwrap();
}
