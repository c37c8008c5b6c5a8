//! Address derivation from secp256k1 public keys.
//!
//! An address is the first 32 bytes of SHAKE-256 over the canonical JSON
//! encoding of the public key's curve point:
//! `{"curve":"secp256k1","x":"<hex>","y":"<hex>"}` with 32-byte big-endian
//! affine coordinates. Rendered as 64 lowercase hex characters.

use k256::ecdsa::VerifyingKey;
use keel_types::Address;
use serde::Serialize;

use crate::hash::shake256_32;

/// Canonical JSON record of an affine secp256k1 point.
#[derive(Serialize)]
struct CurvePoint {
    curve: &'static str,
    x: String,
    y: String,
}

/// Derive the account address for a public key.
///
/// Pure function: the same key always yields the same address.
pub fn derive_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let record = CurvePoint {
        curve: "secp256k1",
        x: hex::encode(point.x().expect("valid public key is not the identity")),
        y: hex::encode(point.y().expect("valid public key is not the identity")),
    };
    let encoded = serde_json::to_vec(&record).expect("curve point serializes to JSON");
    Address::new(shake256_32(&encoded))
}
