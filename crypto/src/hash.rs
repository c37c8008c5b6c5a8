//! Keccak-256 and SHAKE-256 hashing.
//!
//! The canonical hash of any chain value is `Keccak-256(canonical JSON)`,
//! where canonical JSON is the serde encoding of the value: fields in
//! declaration order, no whitespace, integers as decimal, byte values as
//! lowercase hex strings. Every node must produce byte-identical encodings
//! for signatures and hashes to verify across the network.

use keel_types::Hash;
use serde::Serialize;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Digest, Keccak256, Shake256};

/// Compute a 256-bit Keccak hash of arbitrary data.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let result = Keccak256::digest(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the first 32 bytes of SHAKE-256 output over arbitrary data.
pub fn shake256_32(data: &[u8]) -> [u8; 32] {
    let mut hasher = Shake256::default();
    hasher.update(data);
    let mut reader = hasher.finalize_xof();
    let mut output = [0u8; 32];
    reader.read(&mut output);
    output
}

/// Canonical hash of a serializable chain value.
pub fn hash_value<T: Serialize>(value: &T) -> Hash {
    let encoded = serde_json::to_vec(value).expect("chain values serialize to JSON");
    Hash::new(keccak256(&encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_deterministic() {
        assert_eq!(keccak256(b"keel"), keccak256(b"keel"));
    }

    #[test]
    fn keccak_differs_per_input() {
        assert_ne!(keccak256(b"hello"), keccak256(b"world"));
    }

    #[test]
    fn keccak_known_vector() {
        // Keccak-256("") — the legacy (pre-SHA3) padding.
        let h = keccak256(b"");
        assert_eq!(
            hex::encode(h),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn shake_deterministic() {
        assert_eq!(shake256_32(b"keel"), shake256_32(b"keel"));
        assert_ne!(shake256_32(b"a"), shake256_32(b"b"));
    }

    #[test]
    fn hash_value_follows_field_order() {
        #[derive(Serialize)]
        struct A {
            x: u64,
            y: u64,
        }
        #[derive(Serialize)]
        struct B {
            y: u64,
            x: u64,
        }
        let a = hash_value(&A { x: 1, y: 2 });
        let b = hash_value(&B { y: 2, x: 1 });
        assert_ne!(a, b);
    }

    #[test]
    fn hash_value_matches_manual_encoding() {
        #[derive(Serialize)]
        struct V {
            n: u64,
        }
        let expected = Hash::new(keccak256(br#"{"n":7}"#));
        assert_eq!(hash_value(&V { n: 7 }), expected);
    }
}
