//! HTTP JSON API for keel nodes.
//!
//! Serves the client-facing surface: account management, transaction
//! signing/submission/search/proofs, and block search. Peer-facing traffic
//! (genesis and block sync, gossip ingest) rides the P2P wire protocol in
//! `keel-network`, not this API.
//!
//! The node hands in capabilities rather than concrete types: state access
//! through the [`BalanceChecker`] / [`TxApplier`] traits and relaying
//! through a `RelayHandle`.

pub mod error;
pub mod handlers;
pub mod server;

use keel_chain::{ChainError, SharedState, SigTx};
use keel_types::Address;

pub use error::RpcError;
pub use server::{RpcServer, RpcState};

/// Read-only balance lookup.
pub trait BalanceChecker: Send + Sync + 'static {
    fn balance(&self, addr: &Address) -> Option<u64>;
}

/// Transaction admission into the pending pool.
pub trait TxApplier: Send + Sync + 'static {
    fn apply_tx(&self, stx: SigTx) -> Result<(), ChainError>;
    fn nonce(&self, addr: &Address) -> u64;
}

impl BalanceChecker for SharedState {
    fn balance(&self, addr: &Address) -> Option<u64> {
        SharedState::balance(self, addr)
    }
}

impl TxApplier for SharedState {
    fn apply_tx(&self, stx: SigTx) -> Result<(), ChainError> {
        SharedState::apply_tx(self, stx)
    }

    fn nonce(&self, addr: &Address) -> u64 {
        SharedState::nonce(self, addr)
    }
}
