//! Top-level P2P wire message envelope.
//!
//! Every frame exchanged between keel nodes carries one `WireMessage`,
//! encoded as canonical JSON. Gossip pushes (`Tx`, `Block`) arrive on
//! long-lived connections; the request variants are served
//! one-request-per-connection, the response(s) written back on the same
//! stream.

use keel_chain::{SigBlock, SigGenesis, SigTx};
use serde::{Deserialize, Serialize};

/// Top-level P2P wire message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WireMessage {
    /// A signed transaction (gossip push).
    Tx(SigTx),
    /// A signed block (gossip push, and the `BlockSyncRequest` stream unit).
    Block(SigBlock),
    /// Request the signed genesis.
    GenesisRequest,
    /// Response carrying the signed genesis.
    Genesis(SigGenesis),
    /// Request every stored block with `number >= from_number`. The server
    /// answers with a stream of `Block` frames and closes the connection.
    BlockSyncRequest { from_number: u64 },
    /// Register the caller's listen address and request the peer set.
    PeerListRequest { node_addr: String },
    /// Response carrying a snapshot of the peer set.
    PeerListResponse { peers: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_variants_roundtrip() {
        let msg = WireMessage::BlockSyncRequest { from_number: 7 };
        let json = serde_json::to_string(&msg).unwrap();
        match serde_json::from_str::<WireMessage>(&json).unwrap() {
            WireMessage::BlockSyncRequest { from_number } => assert_eq!(from_number, 7),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn peer_list_roundtrip() {
        let msg = WireMessage::PeerListResponse {
            peers: vec!["127.0.0.1:17000".to_string()],
        };
        let json = serde_json::to_string(&msg).unwrap();
        match serde_json::from_str::<WireMessage>(&json).unwrap() {
            WireMessage::PeerListResponse { peers } => assert_eq!(peers.len(), 1),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
