//! Generic gossip relay with deduplication and per-peer fan-out.
//!
//! One consumer task drains a bounded inbound channel (producers, the RPC
//! ingress and the block proposer, block when it fills). Each message is
//! hashed and checked against the dedup cache; a fresh message is fanned
//! out through one outbound task per peer. Per-peer failures are logged
//! and skipped; they never take the relay down.

use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use keel_chain::{SigBlock, SigTx};
use keel_types::Hash;

use crate::connection::{connect, write_frame};
use crate::dedup::MessageDedup;
use crate::peers::PeerDiscovery;
use crate::wire::WireMessage;
use std::sync::Arc;

/// A message type the relay can gossip.
pub trait RelayMessage: Clone + Send + Sync + 'static {
    /// Identity hash used for deduplication.
    fn relay_hash(&self) -> Hash;

    /// Wrap into the wire envelope.
    fn into_wire(self) -> WireMessage;

    /// Short label for log lines.
    fn label() -> &'static str;
}

impl RelayMessage for SigTx {
    fn relay_hash(&self) -> Hash {
        self.hash()
    }

    fn into_wire(self) -> WireMessage {
        WireMessage::Tx(self)
    }

    fn label() -> &'static str {
        "tx"
    }
}

impl RelayMessage for SigBlock {
    fn relay_hash(&self) -> Hash {
        self.hash()
    }

    fn into_wire(self) -> WireMessage {
        WireMessage::Block(self)
    }

    fn label() -> &'static str {
        "block"
    }
}

/// Producer-side handle onto a running relay.
#[derive(Clone)]
pub struct RelayHandle<M> {
    tx: mpsc::Sender<M>,
}

impl<M: RelayMessage> RelayHandle<M> {
    /// Submit a message for relay. Blocks while the inbound channel is full
    /// (backpressure on the producer); a closed relay drops the message.
    pub async fn relay(&self, msg: M) {
        if self.tx.send(msg).await.is_err() {
            tracing::warn!(kind = M::label(), "relay is shut down, message dropped");
        }
    }
}

/// Spawn a relay for message type `M`.
///
/// `buf_size` bounds the inbound channel; `self_relay` controls whether our
/// own address (if it ever appears in the peer set) receives the fan-out.
pub fn spawn_relay<M: RelayMessage>(
    buf_size: usize,
    self_relay: bool,
    peers: Arc<PeerDiscovery>,
    shutdown: broadcast::Receiver<()>,
) -> (RelayHandle<M>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(buf_size);
    let task = tokio::spawn(relay_loop(rx, buf_size, self_relay, peers, shutdown));
    (RelayHandle { tx }, task)
}

async fn relay_loop<M: RelayMessage>(
    mut rx: mpsc::Receiver<M>,
    buf_size: usize,
    self_relay: bool,
    peers: Arc<PeerDiscovery>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut dedup = MessageDedup::default();
    let mut outbound: HashMap<String, mpsc::Sender<M>> = HashMap::new();

    loop {
        let msg = tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!(kind = M::label(), "relay shutting down");
                break;
            }
            msg = rx.recv() => match msg {
                Some(m) => m,
                None => break,
            },
        };

        let hash = msg.relay_hash();
        if dedup.is_duplicate(&hash) {
            tracing::trace!(kind = M::label(), %hash, "duplicate message dropped");
            continue;
        }

        let mut targets = peers.peers();
        if !self_relay {
            targets.retain(|p| p != peers.node_addr());
        }
        tracing::debug!(kind = M::label(), %hash, peers = targets.len(), "relaying message");

        for peer in targets {
            let sender = outbound
                .entry(peer.clone())
                .or_insert_with(|| spawn_peer_sender::<M>(peer.clone(), buf_size));
            if sender.try_send(msg.clone()).is_err() {
                tracing::warn!(
                    kind = M::label(),
                    peer = %peer,
                    "peer send queue unavailable, dropping connection"
                );
                outbound.remove(&peer);
            }
        }
    }
}

/// Spawn the outbound fan-out task for one peer. Each delivery dials the
/// peer, writes one frame, and drops the connection, so a peer that went
/// away between messages costs exactly one failed dial. The task exits
/// when its channel closes (relay shutdown).
fn spawn_peer_sender<M: RelayMessage>(peer: String, buf_size: usize) -> mpsc::Sender<M> {
    let (tx, mut rx) = mpsc::channel::<M>(buf_size);
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let mut stream = match connect(&peer).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(kind = M::label(), peer = %peer, error = %e, "peer dial failed");
                    continue;
                }
            };
            if let Err(e) = write_frame(&mut stream, &msg.into_wire()).await {
                tracing::warn!(kind = M::label(), peer = %peer, error = %e, "relay send failed");
            }
        }
    });
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{read_frame, READ_TIMEOUT};
    use crate::peers::PeerDiscoveryConfig;
    use keel_chain::Tx;
    use keel_crypto::Account;
    use tokio::net::TcpListener;

    fn signed_tx(value: u64) -> SigTx {
        let from = Account::generate();
        let to = Account::generate();
        Tx::new(from.address(), to.address(), value, 1)
            .sign(&from)
            .unwrap()
    }

    async fn peer_fixture() -> (TcpListener, Arc<PeerDiscovery>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = listener.local_addr().unwrap().to_string();
        let peers = Arc::new(PeerDiscovery::new(PeerDiscoveryConfig {
            node_addr: "127.0.0.1:1".to_string(),
            bootstrap: true,
            seed_addrs: Vec::new(),
        }));
        peers.add_peer(&peer_addr);
        (listener, peers)
    }

    #[tokio::test]
    async fn relay_fans_out_to_peer() {
        let (listener, peers) = peer_fixture().await;
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, _task) = spawn_relay::<SigTx>(16, false, peers, shutdown_tx.subscribe());

        let stx = signed_tx(10);
        handle.relay(stx.clone()).await;

        let (mut socket, _) = listener.accept().await.unwrap();
        let frame = read_frame(&mut socket, READ_TIMEOUT).await.unwrap().unwrap();
        match frame {
            WireMessage::Tx(received) => assert_eq!(received.hash(), stx.hash()),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_relay_fans_out_once() {
        let (listener, peers) = peer_fixture().await;
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, _task) = spawn_relay::<SigTx>(16, false, peers, shutdown_tx.subscribe());

        let dup = signed_tx(10);
        let other = signed_tx(20);
        handle.relay(dup.clone()).await;
        handle.relay(dup.clone()).await;
        handle.relay(other.clone()).await;

        // Exactly two deliveries arrive: the duplicate was dropped, so the
        // second delivery is already the other tx.
        let mut received = Vec::new();
        for _ in 0..2 {
            let (mut socket, _) = listener.accept().await.unwrap();
            match read_frame(&mut socket, READ_TIMEOUT).await.unwrap().unwrap() {
                WireMessage::Tx(stx) => received.push(stx.hash()),
                other => panic!("unexpected frame: {other:?}"),
            }
        }
        assert_eq!(received, vec![dup.hash(), other.hash()]);
    }

    #[tokio::test]
    async fn unreachable_peer_does_not_kill_relay() {
        let (listener, peers) = peer_fixture().await;
        peers.add_peer("127.0.0.1:9"); // discard port, nothing listening
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, _task) = spawn_relay::<SigTx>(16, false, peers, shutdown_tx.subscribe());

        let stx = signed_tx(10);
        handle.relay(stx.clone()).await;

        // The healthy peer still receives the message.
        let (mut socket, _) = listener.accept().await.unwrap();
        let frame = read_frame(&mut socket, READ_TIMEOUT).await.unwrap().unwrap();
        assert!(matches!(frame, WireMessage::Tx(_)));
    }
}
