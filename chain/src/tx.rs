//! Transactions and their signed wrapper.
//!
//! Two distinct hashes are in play: the *signed digest* covers the bare
//! [`Tx`] and is what the sender signs; the *identity hash* covers the whole
//! [`SigTx`] (signature included) and keys the pending pool, search, Merkle
//! leaves, and relay dedup.

use keel_crypto::{hash_value, recover_address, Account};
use keel_types::{Address, Hash, Signature, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ChainError;

/// A value transfer from one account to another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tx {
    pub from: Address,
    pub to: Address,
    pub value: u64,
    pub nonce: u64,
    pub time: Timestamp,
}

impl Tx {
    pub fn new(from: Address, to: Address, value: u64, nonce: u64) -> Self {
        Self {
            from,
            to,
            value,
            nonce,
            time: Timestamp::now(),
        }
    }

    /// The digest the sender signs.
    pub fn hash(&self) -> Hash {
        hash_value(self)
    }

    /// Sign this transaction, producing its signed wrapper.
    pub fn sign(self, account: &Account) -> Result<SigTx, ChainError> {
        let sig = account.sign_hash(&self.hash())?;
        Ok(SigTx { tx: self, sig })
    }
}

/// A transaction with its sender's recoverable signature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigTx {
    #[serde(flatten)]
    pub tx: Tx,
    pub sig: Signature,
}

impl SigTx {
    /// The transaction's identity hash (covers the signature).
    pub fn hash(&self) -> Hash {
        hash_value(self)
    }
}

impl fmt::Display for SigTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tx {:.7}: {:.7} -> {:.7} {:8} {:4}",
            self.hash().to_string(),
            self.tx.from.to_string(),
            self.tx.to.to_string(),
            self.tx.value,
            self.tx.nonce
        )
    }
}

/// Verify a signed transaction: recover the signer from the signature over
/// the inner-`Tx` digest and compare against the claimed `from` address.
pub fn verify_tx(stx: &SigTx) -> bool {
    match recover_address(&stx.tx.hash(), &stx.sig) {
        Ok(addr) => addr == stx.tx.from,
        Err(_) => false,
    }
}

/// A search result: a signed transaction plus the coordinates of the block
/// that contains it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchTx {
    #[serde(flatten)]
    pub tx: SigTx,
    pub block_number: u64,
    pub block_hash: Hash,
    pub merkle_root: Hash,
}

impl SearchTx {
    pub fn new(tx: SigTx, block_number: u64, block_hash: Hash, merkle_root: Hash) -> Self {
        Self {
            tx,
            block_number,
            block_hash,
            merkle_root,
        }
    }
}
