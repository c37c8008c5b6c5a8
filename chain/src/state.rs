//! The replicated state machine: balances, nonces, and the pending pool.
//!
//! Commit discipline is copy-on-write: validators mutate a deep [`Clone`]
//! speculatively and swap it into the shared state with [`State::apply`] on
//! success. [`SharedState`] enforces the lock policy for concurrent callers.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use keel_crypto::Account;
use keel_types::{Address, Hash};

use crate::block::{verify_block, Block, SigBlock};
use crate::error::ChainError;
use crate::genesis::SigGenesis;
use crate::merkle::tx_merkle_root;
use crate::tx::{verify_tx, SigTx};

/// In-memory ledger replicated across all nodes.
#[derive(Clone)]
pub struct State {
    balances: HashMap<Address, u64>,
    nonces: HashMap<Address, u64>,
    pending: HashMap<Hash, SigTx>,
    last_block: Option<SigBlock>,
    genesis_hash: Hash,
    authority: Address,
}

impl State {
    /// Create the state from a verified genesis.
    pub fn new(genesis: &SigGenesis) -> Self {
        Self {
            balances: genesis
                .genesis
                .balances
                .iter()
                .map(|(a, b)| (*a, *b))
                .collect(),
            nonces: HashMap::new(),
            pending: HashMap::new(),
            last_block: None,
            genesis_hash: genesis.hash(),
            authority: genesis.genesis.authority,
        }
    }

    pub fn authority(&self) -> Address {
        self.authority
    }

    pub fn balance(&self, addr: &Address) -> Option<u64> {
        self.balances.get(addr).copied()
    }

    /// Highest applied nonce for an address; 0 if the address never sent.
    pub fn nonce(&self, addr: &Address) -> u64 {
        self.nonces.get(addr).copied().unwrap_or(0)
    }

    pub fn last_block(&self) -> Option<&SigBlock> {
        self.last_block.as_ref()
    }

    /// Number of the last applied block; 0 before any block.
    pub fn last_block_number(&self) -> u64 {
        self.last_block.as_ref().map_or(0, |b| b.block.number)
    }

    /// Hash the next block must name as its parent: the last applied block's
    /// identity hash, or the genesis hash before any block.
    pub fn last_block_hash(&self) -> Hash {
        self.last_block
            .as_ref()
            .map_or(self.genesis_hash, |b| b.hash())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Sum of all balances. Conserved by every valid block.
    pub fn total_supply(&self) -> u64 {
        self.balances.values().sum()
    }

    /// Replace this state wholesale with a validated clone.
    pub fn apply(&mut self, other: State) {
        *self = other;
    }

    /// Admit a signed transaction to the pending pool.
    ///
    /// Validates the signature, the nonce (must be exactly one past the
    /// highest applied nonce — a replayed, already-applied transaction fails
    /// here), and the sender's balance. Nothing is mutated on error.
    pub fn apply_tx(&mut self, stx: SigTx) -> Result<(), ChainError> {
        if !verify_tx(&stx) {
            return Err(ChainError::BadSignature);
        }
        let hash = stx.hash();
        if self.pending.contains_key(&hash) {
            return Err(ChainError::Duplicate(hash));
        }
        let expected = self.nonce(&stx.tx.from) + 1;
        if stx.tx.nonce != expected {
            return Err(ChainError::NonceMismatch {
                expected,
                got: stx.tx.nonce,
            });
        }
        let have = self.balance(&stx.tx.from).unwrap_or(0);
        if have < stx.tx.value {
            return Err(ChainError::InsufficientBalance {
                have,
                need: stx.tx.value,
            });
        }
        self.pending.insert(hash, stx);
        Ok(())
    }

    /// Execute a transaction against balances and nonces.
    fn execute_tx(&mut self, stx: &SigTx) -> Result<(), ChainError> {
        if !verify_tx(stx) {
            return Err(ChainError::BadSignature);
        }
        let expected = self.nonce(&stx.tx.from) + 1;
        if stx.tx.nonce != expected {
            return Err(ChainError::NonceMismatch {
                expected,
                got: stx.tx.nonce,
            });
        }
        let have = self.balance(&stx.tx.from).unwrap_or(0);
        if have < stx.tx.value {
            return Err(ChainError::InsufficientBalance {
                have,
                need: stx.tx.value,
            });
        }
        *self.balances.entry(stx.tx.from).or_insert(0) -= stx.tx.value;
        *self.balances.entry(stx.tx.to).or_insert(0) += stx.tx.value;
        self.nonces.insert(stx.tx.from, stx.tx.nonce);
        Ok(())
    }

    /// Assemble and sign the next block from the pending pool.
    ///
    /// Pending transactions are drained in `(from, nonce)` order for
    /// reproducibility; each candidate is executed against a scratch clone
    /// and only the ones that apply cleanly are included, so one stale
    /// pending entry cannot poison the proposal. Does not mutate `self` —
    /// the caller validates the result on a clone and commits via
    /// [`State::apply`].
    pub fn create_block(&self, authority: &Account) -> Result<SigBlock, ChainError> {
        if authority.address() != self.authority {
            return Err(ChainError::NotAuthority);
        }

        let mut candidates: Vec<SigTx> = self.pending.values().cloned().collect();
        candidates.sort_by(|a, b| (a.tx.from, a.tx.nonce).cmp(&(b.tx.from, b.tx.nonce)));

        let mut scratch = self.clone();
        let mut txs = Vec::with_capacity(candidates.len());
        for stx in candidates {
            match scratch.execute_tx(&stx) {
                Ok(()) => txs.push(stx),
                Err(e) => {
                    tracing::debug!(tx = %stx, error = %e, "pending tx excluded from block");
                }
            }
        }
        if txs.is_empty() {
            return Err(ChainError::NothingToPropose);
        }

        let block = Block::new(self.last_block_number() + 1, self.last_block_hash(), txs)?;
        block.sign(authority)
    }

    /// Validate and apply a signed block.
    ///
    /// Checks parent linkage, block number, the authority signature, and the
    /// Merkle root, then executes every transaction in order — any per-tx
    /// failure is fatal for the whole block. Call this on a clone and commit
    /// with [`State::apply`]: a mid-block error leaves the clone partially
    /// mutated.
    pub fn apply_block(&mut self, sblk: &SigBlock) -> Result<(), ChainError> {
        let expected_number = self.last_block_number() + 1;
        if sblk.block.number != expected_number {
            return Err(ChainError::BadNumber {
                expected: expected_number,
                got: sblk.block.number,
            });
        }
        let expected_parent = self.last_block_hash();
        if sblk.block.parent != expected_parent {
            return Err(ChainError::BadParent {
                expected: expected_parent,
                got: sblk.block.parent,
            });
        }
        if !verify_block(sblk, &self.authority) {
            return Err(ChainError::BadAuthoritySig);
        }
        if tx_merkle_root(&sblk.block.txs)? != sblk.block.merkle_root {
            return Err(ChainError::BadMerkleRoot);
        }

        for stx in &sblk.block.txs {
            self.execute_tx(stx)?;
            self.pending.remove(&stx.hash());
        }

        // Retire pending entries the applied nonces have overtaken.
        let nonces = &self.nonces;
        self.pending
            .retain(|_, p| p.tx.nonce > nonces.get(&p.tx.from).copied().unwrap_or(0));

        self.last_block = Some(sblk.clone());
        Ok(())
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "state at block {}:", self.last_block_number())?;
        let mut accounts: Vec<_> = self.balances.iter().collect();
        accounts.sort();
        for (addr, balance) in accounts {
            writeln!(
                f,
                "  {:.7} balance {:8} nonce {}",
                addr.to_string(),
                balance,
                self.nonce(addr)
            )?;
        }
        write!(f, "  pending: {}", self.pending.len())
    }
}

/// Thread-safe handle over the node's single mutable [`State`].
///
/// Mutating operations take the exclusive lock; reads take the shared lock.
/// The clone-validate-swap cycle for block application runs entirely under
/// one exclusive lock so concurrent committers cannot overwrite each other.
/// No I/O ever happens under the lock.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<RwLock<State>>,
}

impl SharedState {
    pub fn new(state: State) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub fn balance(&self, addr: &Address) -> Option<u64> {
        self.read().balance(addr)
    }

    pub fn nonce(&self, addr: &Address) -> u64 {
        self.read().nonce(addr)
    }

    pub fn authority(&self) -> Address {
        self.read().authority()
    }

    pub fn last_block_number(&self) -> u64 {
        self.read().last_block_number()
    }

    pub fn last_block_hash(&self) -> Hash {
        self.read().last_block_hash()
    }

    pub fn pending_len(&self) -> usize {
        self.read().pending_len()
    }

    /// Detached deep copy for speculative execution; requires no lock
    /// beyond the shared read.
    pub fn snapshot(&self) -> State {
        self.read().clone()
    }

    /// Admit a transaction to the pending pool under the exclusive lock.
    pub fn apply_tx(&self, stx: SigTx) -> Result<(), ChainError> {
        self.write().apply_tx(stx)
    }

    /// Validate a block on a clone and atomically swap it in.
    pub fn apply_block(&self, sblk: &SigBlock) -> Result<(), ChainError> {
        let mut guard = self.write();
        let mut clone = guard.clone();
        clone.apply_block(sblk)?;
        guard.apply(clone);
        Ok(())
    }

    /// Assemble the next block from pending under the shared lock.
    pub fn create_block(&self, authority: &Account) -> Result<SigBlock, ChainError> {
        self.read().create_block(authority)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.inner.read().expect("state lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.inner.write().expect("state lock poisoned")
    }
}
