//! Recoverable ECDSA signing over secp256k1.
//!
//! Signatures are 65 bytes: the 64-byte `r || s` pair (lower-S normalized)
//! followed by a 1-byte recovery id. Verification never needs the public
//! key — it is recovered from the signature and digest, and the derived
//! address is compared against the claimed signer.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use keel_types::{Address, Hash, Signature};

use crate::address::derive_address;
use crate::error::CryptoError;

/// Sign a 32-byte digest, producing a 65-byte recoverable signature.
pub fn sign_hash(key: &SigningKey, digest: &Hash) -> Result<Signature, CryptoError> {
    let (mut sig, mut recovery_id) = key.sign_prehash_recoverable(digest.as_bytes())?;
    // Lower-S normalization; negating s flips the parity the recovery id
    // encodes.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let mut bytes = [0u8; 65];
    bytes[..64].copy_from_slice(&sig.to_bytes());
    bytes[64] = recovery_id.to_byte();
    Ok(Signature::new(bytes))
}

/// Recover the signer's address from a digest and a recoverable signature.
pub fn recover_address(digest: &Hash, signature: &Signature) -> Result<Address, CryptoError> {
    let sig = EcdsaSignature::from_slice(signature.rs())?;
    let recovery_id =
        RecoveryId::from_byte(signature.recovery_id()).ok_or(CryptoError::InvalidRecoveryId)?;
    let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &sig, recovery_id)?;
    Ok(derive_address(&key))
}
