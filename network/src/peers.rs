//! Peer discovery and peer-set maintenance.
//!
//! Bootstrap nodes start with an empty peer set and learn peers from
//! incoming `PeerListRequest` registrations. Every other node seeds its set
//! from the configured seed addresses, registers itself with each seed on
//! startup, and refreshes periodically.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::connection::request;
use crate::wire::WireMessage;

/// How often a non-bootstrap node re-contacts its peers for fresh listings.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Peer discovery configuration.
#[derive(Clone, Debug)]
pub struct PeerDiscoveryConfig {
    /// This node's own listen address, excluded from peer snapshots.
    pub node_addr: String,
    /// Bootstrap nodes accept registrations instead of contacting seeds.
    pub bootstrap: bool,
    /// Seed addresses contacted on startup and on every refresh.
    pub seed_addrs: Vec<String>,
}

/// Maintains the set of known peer addresses.
pub struct PeerDiscovery {
    cfg: PeerDiscoveryConfig,
    peers: RwLock<HashSet<String>>,
}

impl PeerDiscovery {
    pub fn new(cfg: PeerDiscoveryConfig) -> Self {
        let mut peers = HashSet::new();
        if !cfg.bootstrap {
            for seed in &cfg.seed_addrs {
                if !seed.is_empty() && *seed != cfg.node_addr {
                    peers.insert(seed.clone());
                }
            }
        }
        Self {
            cfg,
            peers: RwLock::new(peers),
        }
    }

    pub fn node_addr(&self) -> &str {
        &self.cfg.node_addr
    }

    pub fn is_bootstrap(&self) -> bool {
        self.cfg.bootstrap
    }

    /// Snapshot of the known peers, never containing our own address.
    pub fn peers(&self) -> Vec<String> {
        let guard = self.peers.read().expect("peer set lock poisoned");
        guard.iter().cloned().collect()
    }

    /// Record a peer address. Our own address and empty strings are ignored.
    pub fn add_peer(&self, addr: &str) {
        if addr.is_empty() || addr == self.cfg.node_addr {
            return;
        }
        let mut guard = self.peers.write().expect("peer set lock poisoned");
        if guard.insert(addr.to_string()) {
            tracing::info!(peer = %addr, "peer discovered");
        }
    }

    pub fn add_peers<I: IntoIterator<Item = String>>(&self, addrs: I) {
        for addr in addrs {
            self.add_peer(&addr);
        }
    }

    /// Contact every known peer (seeds included), register our address, and
    /// merge the returned peer lists. Individual peer failures are logged
    /// and skipped.
    pub async fn refresh_once(&self) {
        for peer in self.peers() {
            let req = WireMessage::PeerListRequest {
                node_addr: self.cfg.node_addr.clone(),
            };
            match request(&peer, &req).await {
                Ok(WireMessage::PeerListResponse { peers }) => {
                    self.add_peers(peers);
                }
                Ok(other) => {
                    tracing::warn!(peer = %peer, ?other, "unexpected peer list response");
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "peer list refresh failed");
                }
            }
        }
    }

    /// Periodic refresh loop. Bootstrap nodes return immediately — they
    /// only learn peers from incoming registrations.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if self.cfg.bootstrap {
            return;
        }
        self.refresh_once().await;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("peer discovery shutting down");
                    break;
                }
                _ = tokio::time::sleep(REFRESH_INTERVAL) => {
                    self.refresh_once().await;
                }
            }
        }
    }
}
