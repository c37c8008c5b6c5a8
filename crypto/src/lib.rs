//! Cryptographic identity for the keel chain.
//!
//! Everything signature-shaped lives here: secp256k1 key generation,
//! Keccak-256 canonical hashing, SHAKE-256 address derivation, 65-byte
//! recoverable ECDSA signatures, and the password-encrypted keystore.

pub mod address;
pub mod error;
pub mod hash;
pub mod keys;
pub mod keystore;
pub mod sign;

pub use address::derive_address;
pub use error::CryptoError;
pub use hash::{hash_value, keccak256, shake256_32};
pub use keys::Account;
pub use sign::{recover_address, sign_hash};
