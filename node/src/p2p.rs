//! The P2P wire server.
//!
//! Accepts framed TCP connections from peers and dispatches:
//! gossip pushes (transactions and blocks) are validated, applied, and
//! re-relayed; `GenesisRequest`, `BlockSyncRequest`, and `PeerListRequest`
//! are answered on the same stream. One task per connection; a failed
//! connection only takes itself down.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::broadcast;

use keel_chain::{SharedState, SigBlock, SigTx};
use keel_network::{read_frame, write_frame, PeerDiscovery, RelayHandle, WireMessage, READ_TIMEOUT};
use keel_store::BlockStore;

use crate::error::NodeError;
use crate::event_stream::EventStream;

/// Serves the wire protocol to peers.
pub struct P2pServer {
    addr: String,
    state: SharedState,
    store: BlockStore,
    peers: Arc<PeerDiscovery>,
    events: Arc<EventStream>,
    tx_relay: RelayHandle<SigTx>,
    block_relay: RelayHandle<SigBlock>,
}

impl P2pServer {
    pub fn new(
        addr: impl Into<String>,
        state: SharedState,
        store: BlockStore,
        peers: Arc<PeerDiscovery>,
        events: Arc<EventStream>,
        tx_relay: RelayHandle<SigTx>,
        block_relay: RelayHandle<SigBlock>,
    ) -> Self {
        Self {
            addr: addr.into(),
            state,
            store,
            peers,
            events,
            tx_relay,
            block_relay,
        }
    }

    /// Accept loop. Runs until shutdown; each connection gets its own task.
    pub async fn serve(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), NodeError> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        tracing::info!(addr = %self.addr, "P2P server listening");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("P2P server shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, remote)) => {
                            let server = Arc::clone(&self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream).await {
                                    tracing::debug!(peer = %remote, error = %e, "peer connection closed");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Read frames until the peer closes or errors. Gossip frames keep the
    /// connection open; a `BlockSyncRequest` streams its response and
    /// closes.
    async fn handle_connection(&self, mut stream: TcpStream) -> Result<(), NodeError> {
        while let Some(msg) = read_frame(&mut stream, READ_TIMEOUT).await? {
            match msg {
                WireMessage::Tx(stx) => self.receive_tx(stx).await,
                WireMessage::Block(sblk) => self.receive_block(sblk).await,
                WireMessage::GenesisRequest => {
                    let sgen = self.store.read_genesis()?;
                    write_frame(&mut stream, &WireMessage::Genesis(sgen)).await?;
                }
                WireMessage::BlockSyncRequest { from_number } => {
                    self.serve_block_sync(&mut stream, from_number).await?;
                    break;
                }
                WireMessage::PeerListRequest { node_addr } => {
                    self.peers.add_peer(&node_addr);
                    let peers = self.peers.peers();
                    write_frame(&mut stream, &WireMessage::PeerListResponse { peers }).await?;
                }
                other => {
                    tracing::debug!(?other, "unexpected wire message ignored");
                }
            }
        }
        Ok(())
    }

    /// Admit a gossiped transaction and pass it on. Validation failures are
    /// logged and dropped — a bad transaction never kills the connection.
    async fn receive_tx(&self, stx: SigTx) {
        tracing::debug!(%stx, "tx received from peer");
        match self.state.apply_tx(stx.clone()) {
            Ok(()) => self.tx_relay.relay(stx).await,
            Err(e) => {
                tracing::debug!(tx = %stx, error = %e, "gossiped tx rejected");
            }
        }
    }

    /// Validate, apply, persist, publish, and re-relay a gossiped block.
    async fn receive_block(&self, sblk: SigBlock) {
        match self.state.apply_block(&sblk) {
            Ok(()) => {
                if let Err(e) = self.store.write_block(&sblk) {
                    tracing::error!(hash = %sblk.hash(), error = %e, "failed to persist block");
                }
                tracing::info!(
                    number = sblk.block.number,
                    txs = sblk.block.txs.len(),
                    hash = %sblk.hash(),
                    "block applied"
                );
                self.events.publish_block(&sblk);
                self.block_relay.relay(sblk).await;
            }
            Err(e) => {
                tracing::debug!(hash = %sblk.hash(), error = %e, "gossiped block rejected");
            }
        }
    }

    /// Stream every stored block at or past `from_number`, then let the
    /// connection close.
    async fn serve_block_sync(
        &self,
        stream: &mut TcpStream,
        from_number: u64,
    ) -> Result<(), NodeError> {
        let mut sent = 0u64;
        for result in self.store.read_blocks()? {
            let sblk = result?;
            if sblk.block.number >= from_number {
                write_frame(stream, &WireMessage::Block(sblk)).await?;
                sent += 1;
            }
        }
        tracing::debug!(from_number, sent, "block sync served");
        Ok(())
    }
}
