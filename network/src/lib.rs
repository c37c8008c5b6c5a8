//! Peer-to-peer plumbing for keel nodes.
//!
//! All peer traffic rides a single framed TCP wire protocol: 4-byte
//! big-endian length prefix followed by a canonical-JSON [`WireMessage`].
//! Gossip (transactions and blocks) flows through a generic relay spawned
//! with [`relay::spawn_relay`], which deduplicates by message hash and fans
//! out through one task per peer. Peer addresses come from
//! [`peers::PeerDiscovery`].

pub mod connection;
pub mod dedup;
pub mod error;
pub mod peers;
pub mod relay;
pub mod wire;

pub use connection::{connect, read_frame, request, write_frame, MAX_FRAME_SIZE, READ_TIMEOUT};
pub use dedup::MessageDedup;
pub use error::NetworkError;
pub use peers::{PeerDiscovery, PeerDiscoveryConfig};
pub use relay::{spawn_relay, RelayHandle, RelayMessage};
pub use wire::WireMessage;
