//! The signed genesis record that anchors the chain.
//!
//! The genesis fixes the chain name, the authority address, and the initial
//! balances. Its identity hash is the first block's `parent`. Balances live
//! in a `BTreeMap` so the canonical JSON encoding has sorted keys.

use std::collections::BTreeMap;

use keel_crypto::{hash_value, recover_address, Account};
use keel_types::{Address, Hash, Signature, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// The unsigned genesis record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genesis {
    pub chain: String,
    pub authority: Address,
    pub balances: BTreeMap<Address, u64>,
    pub time: Timestamp,
}

impl Genesis {
    /// Build a genesis granting the owner account the full initial supply.
    pub fn new(chain: &str, authority: Address, owner: Address, balance: u64) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(owner, balance);
        Self {
            chain: chain.to_string(),
            authority,
            balances,
            time: Timestamp::now(),
        }
    }

    /// The digest the authority signs.
    pub fn hash(&self) -> Hash {
        hash_value(self)
    }

    /// Sign the genesis with the authority account.
    pub fn sign(self, authority: &Account) -> Result<SigGenesis, ChainError> {
        let sig = authority.sign_hash(&self.hash())?;
        Ok(SigGenesis { genesis: self, sig })
    }
}

/// A genesis with the authority's recoverable signature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigGenesis {
    #[serde(flatten)]
    pub genesis: Genesis,
    pub sig: Signature,
}

impl SigGenesis {
    /// The genesis identity hash: the first block's `parent`.
    pub fn hash(&self) -> Hash {
        hash_value(self)
    }
}

/// Verify a signed genesis: the signer recovered from the signature must be
/// the authority address embedded in the genesis itself.
pub fn verify_genesis(sgen: &SigGenesis) -> bool {
    match recover_address(&sgen.genesis.hash(), &sgen.sig) {
        Ok(addr) => addr == sgen.genesis.authority,
        Err(_) => false,
    }
}
