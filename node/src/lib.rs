//! The keel full node.
//!
//! Wires the chain state machine, block store, gossip relays, peer
//! discovery, event stream, block proposer, and RPC server into one
//! process. All long-lived tasks select over a root shutdown signal and are
//! joined before exit.

pub mod config;
pub mod error;
pub mod event_stream;
pub mod logging;
pub mod node;
pub mod p2p;
pub mod proposer;
pub mod shutdown;
pub mod state_sync;

pub use config::NodeConfig;
pub use error::NodeError;
pub use event_stream::EventStream;
pub use logging::{init_logging, LogFormat};
pub use node::Node;
pub use p2p::P2pServer;
pub use proposer::BlockProposer;
pub use shutdown::Shutdown;
pub use state_sync::StateSync;
