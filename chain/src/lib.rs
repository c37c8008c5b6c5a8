//! The keel chain core: transactions, blocks, Merkle proofs, and the
//! replicated account-balance state machine.
//!
//! A single authority account signs the genesis and every block. The chain
//! is linear and append-only; state is never snapshotted, only rebuilt by
//! replaying the block log.

pub mod block;
pub mod error;
pub mod event;
pub mod genesis;
pub mod merkle;
pub mod state;
pub mod tx;

pub use block::{verify_block, Block, SigBlock};
pub use error::ChainError;
pub use event::{Event, EventKind};
pub use genesis::{verify_genesis, Genesis, SigGenesis};
pub use merkle::{
    merkle_build, merkle_prove, merkle_root, merkle_verify, tx_merkle_root, tx_merkle_tree,
    tx_pair_hash, ProofStep, Side,
};
pub use state::{SharedState, State};
pub use tx::{verify_tx, SearchTx, SigTx, Tx};
