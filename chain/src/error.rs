use keel_crypto::CryptoError;
use keel_types::Hash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid transaction signature")]
    BadSignature,

    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u64, need: u64 },

    #[error("duplicate transaction {0}")]
    Duplicate(Hash),

    #[error("bad parent: expected {expected}, got {got}")]
    BadParent { expected: Hash, got: Hash },

    #[error("bad block number: expected {expected}, got {got}")]
    BadNumber { expected: u64, got: u64 },

    #[error("authority signature is invalid")]
    BadAuthoritySig,

    #[error("merkle root does not match the block's transactions")]
    BadMerkleRoot,

    #[error("account is not the chain authority")]
    NotAuthority,

    #[error("no applicable pending transactions")]
    NothingToPropose,

    #[error("merkle: no leaves to build a tree")]
    EmptyMerkleTree,

    #[error("merkle: leaf not found in tree")]
    MerkleLeafNotFound,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
