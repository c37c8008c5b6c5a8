//! Password-based encryption for private key files.
//!
//! Layout of an encrypted keystore file:
//! `salt(32) || nonce(12) || ciphertext || tag(16)`.
//!
//! The encryption key is derived from the password with Argon2id
//! (t=1, m=256 KiB, p=1, 32-byte output) and a fresh random salt per file,
//! then the payload is sealed with AES-256-GCM under a fresh random nonce.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CryptoError;

/// Salt length in bytes.
const SALT_LEN: usize = 32;
/// AES-GCM nonce length in bytes (96 bits).
const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Argon2id parameters: 256 KiB memory, 1 iteration, 1 lane.
const ARGON2_MEMORY_KIB: u32 = 256;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 1;
const ARGON2_OUTPUT_LEN: usize = 32;

/// Derive a 32-byte encryption key from a password and salt.
fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; 32], CryptoError> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(ARGON2_OUTPUT_LEN),
    )
    .map_err(|e| CryptoError::Key(format!("Argon2 params error: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| CryptoError::Key(format!("Argon2 hashing failed: {e}")))?;
    Ok(output)
}

/// Encrypt a payload with a password: `salt || nonce || ciphertext+tag`.
pub fn encrypt_with_password(plaintext: &[u8], password: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::Key(format!("AES key init failed: {e}")))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CryptoError::Key("encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `salt || nonce || ciphertext+tag` payload with a password.
///
/// Fails with [`CryptoError::DecryptFailed`] on a wrong password or any
/// tampering (the GCM tag covers the whole ciphertext).
pub fn decrypt_with_password(data: &[u8], password: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Truncated);
    }
    let (salt, rest) = data.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(password, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::Key(format!("AES key init failed: {e}")))?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let data = encrypt_with_password(b"secret payload", b"password1").unwrap();
        let plain = decrypt_with_password(&data, b"password1").unwrap();
        assert_eq!(plain, b"secret payload");
    }

    #[test]
    fn layout_has_salt_nonce_tag_overhead() {
        let data = encrypt_with_password(b"xyz", b"pass").unwrap();
        assert_eq!(data.len(), SALT_LEN + NONCE_LEN + 3 + TAG_LEN);
    }

    #[test]
    fn wrong_password_fails() {
        let data = encrypt_with_password(b"secret", b"right").unwrap();
        assert!(matches!(
            decrypt_with_password(&data, b"wrong"),
            Err(CryptoError::DecryptFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut data = encrypt_with_password(b"secret", b"pass").unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(matches!(
            decrypt_with_password(&data, b"pass"),
            Err(CryptoError::DecryptFailed)
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        assert!(matches!(
            decrypt_with_password(&[0u8; 10], b"pass"),
            Err(CryptoError::Truncated)
        ));
    }

    #[test]
    fn fresh_salt_per_encryption() {
        let a = encrypt_with_password(b"same", b"pass").unwrap();
        let b = encrypt_with_password(b"same", b"pass").unwrap();
        assert_ne!(a, b);
    }
}
