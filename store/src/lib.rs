//! Append-only block storage for keel.
//!
//! Two files per chain directory: `genesis.json` holds the single signed
//! genesis, `blocks.json` is a newline-delimited JSON stream of signed
//! blocks in application order. State is never persisted — it is rebuilt by
//! replaying the log through the state machine.

pub mod block_store;
pub mod error;

pub use block_store::{BlockIterator, BlockStore};
pub use error::StoreError;
