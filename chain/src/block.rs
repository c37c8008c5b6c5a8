//! Blocks and their authority-signed wrapper.

use keel_crypto::{hash_value, recover_address, Account};
use keel_types::{Address, Hash, Signature, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ChainError;
use crate::merkle::tx_merkle_root;
use crate::tx::SigTx;

/// A batch of signed transactions chained to its predecessor.
///
/// `parent` is the identity hash of the previous [`SigBlock`] (or of the
/// signed genesis for block number 1); `merkle_root` commits to `txs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub parent: Hash,
    pub txs: Vec<SigTx>,
    pub time: Timestamp,
    pub merkle_root: Hash,
}

impl Block {
    /// Assemble a block over a non-empty transaction list, computing the
    /// Merkle root.
    pub fn new(number: u64, parent: Hash, txs: Vec<SigTx>) -> Result<Self, ChainError> {
        let merkle_root = tx_merkle_root(&txs)?;
        Ok(Self {
            number,
            parent,
            txs,
            time: Timestamp::now(),
            merkle_root,
        })
    }

    /// The digest the authority signs.
    pub fn hash(&self) -> Hash {
        hash_value(self)
    }

    /// Sign this block with the authority account.
    pub fn sign(self, authority: &Account) -> Result<SigBlock, ChainError> {
        let sig = authority.sign_hash(&self.hash())?;
        Ok(SigBlock { block: self, sig })
    }
}

/// A block with the authority's recoverable signature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigBlock {
    #[serde(flatten)]
    pub block: Block,
    pub sig: Signature,
}

impl SigBlock {
    /// The block's identity hash (covers the signature); the next block's
    /// `parent`.
    pub fn hash(&self) -> Hash {
        hash_value(self)
    }
}

impl fmt::Display for SigBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "block {}: {:.7} <- {:.7} merkle {:.7}",
            self.block.number,
            self.hash().to_string(),
            self.block.parent.to_string(),
            self.block.merkle_root.to_string()
        )?;
        for tx in &self.block.txs {
            writeln!(f, "  {tx}")?;
        }
        Ok(())
    }
}

/// Verify a signed block: the signer recovered from the signature over the
/// block digest must be the chain authority.
pub fn verify_block(sblk: &SigBlock, authority: &Address) -> bool {
    match recover_address(&sblk.block.hash(), &sblk.sig) {
        Ok(addr) => addr == *authority,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::Tx;

    fn signed_tx(from: &Account, to: Address, value: u64, nonce: u64) -> SigTx {
        Tx::new(from.address(), to, value, nonce).sign(from).unwrap()
    }

    #[test]
    fn sign_then_verify() {
        let authority = Account::generate();
        let sender = Account::generate();
        let txs = vec![signed_tx(&sender, authority.address(), 1, 1)];

        let sblk = Block::new(1, Hash::ZERO, txs)
            .unwrap()
            .sign(&authority)
            .unwrap();
        assert!(verify_block(&sblk, &authority.address()));
    }

    #[test]
    fn wrong_authority_rejected() {
        let authority = Account::generate();
        let imposter = Account::generate();
        let sender = Account::generate();
        let txs = vec![signed_tx(&sender, authority.address(), 1, 1)];

        let sblk = Block::new(1, Hash::ZERO, txs)
            .unwrap()
            .sign(&imposter)
            .unwrap();
        assert!(!verify_block(&sblk, &authority.address()));
    }

    #[test]
    fn tampered_block_fails_verification() {
        let authority = Account::generate();
        let sender = Account::generate();
        let txs = vec![signed_tx(&sender, authority.address(), 1, 1)];

        let mut sblk = Block::new(1, Hash::ZERO, txs)
            .unwrap()
            .sign(&authority)
            .unwrap();
        sblk.block.number = 99;
        assert!(!verify_block(&sblk, &authority.address()));
    }

    #[test]
    fn empty_block_rejected() {
        let result = Block::new(1, Hash::ZERO, Vec::new());
        assert!(matches!(result, Err(ChainError::EmptyMerkleTree)));
    }

    #[test]
    fn merkle_root_commits_to_txs() {
        let authority = Account::generate();
        let sender = Account::generate();
        let a = signed_tx(&sender, authority.address(), 1, 1);
        let b = signed_tx(&sender, authority.address(), 2, 2);

        let blk1 = Block::new(1, Hash::ZERO, vec![a.clone()]).unwrap();
        let blk2 = Block::new(1, Hash::ZERO, vec![a, b]).unwrap();
        assert_ne!(blk1.merkle_root, blk2.merkle_root);
    }

    #[test]
    fn json_roundtrip() {
        let authority = Account::generate();
        let sender = Account::generate();
        let txs = vec![signed_tx(&sender, authority.address(), 3, 1)];
        let sblk = Block::new(1, Hash::ZERO, txs)
            .unwrap()
            .sign(&authority)
            .unwrap();

        let json = serde_json::to_string(&sblk).unwrap();
        let back: SigBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sblk);
        assert_eq!(back.hash(), sblk.hash());
    }
}
