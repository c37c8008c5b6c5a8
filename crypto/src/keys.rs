//! Account type: an owned secp256k1 keypair plus its derived address.

use std::fs;
use std::path::{Path, PathBuf};

use k256::ecdsa::SigningKey;
use keel_types::{Address, Hash, Signature};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::address::derive_address;
use crate::error::CryptoError;
use crate::keystore::{decrypt_with_password, encrypt_with_password};
use crate::sign::sign_hash;

/// Canonical JSON record of a private key, as stored (encrypted) on disk.
#[derive(Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
struct KeyRecord {
    curve: String,
    x: String,
    y: String,
    d: String,
}

/// An owned secp256k1 keypair and its derived address.
pub struct Account {
    signing: SigningKey,
    address: Address,
}

impl Account {
    /// Generate a fresh account from the OS random source.
    pub fn generate() -> Self {
        let signing = SigningKey::random(&mut OsRng);
        let address = derive_address(signing.verifying_key());
        Self { signing, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest with this account's private key.
    pub fn sign_hash(&self, digest: &Hash) -> Result<Signature, CryptoError> {
        sign_hash(&self.signing, digest)
    }

    fn key_record(&self) -> KeyRecord {
        let point = self.signing.verifying_key().to_encoded_point(false);
        KeyRecord {
            curve: "secp256k1".to_string(),
            x: hex::encode(point.x().expect("valid public key is not the identity")),
            y: hex::encode(point.y().expect("valid public key is not the identity")),
            d: hex::encode(self.signing.to_bytes()),
        }
    }

    fn from_key_record(record: &KeyRecord) -> Result<Self, CryptoError> {
        let mut scalar =
            hex::decode(&record.d).map_err(|e| CryptoError::Key(format!("invalid d hex: {e}")))?;
        let signing = SigningKey::from_slice(&scalar)
            .map_err(|e| CryptoError::Key(format!("invalid private scalar: {e}")))?;
        scalar.zeroize();
        let address = derive_address(signing.verifying_key());
        Ok(Self { signing, address })
    }

    /// Encrypt and persist this account under `dir`, named by its hex
    /// address. The directory is created with owner-only permissions.
    pub fn write_to_dir(&self, dir: &Path, password: &[u8]) -> Result<PathBuf, CryptoError> {
        let mut plaintext = serde_json::to_vec(&self.key_record())?;
        let encrypted = encrypt_with_password(&plaintext, password)?;
        plaintext.zeroize();

        fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
        }

        let path = dir.join(self.address.to_string());
        fs::write(&path, &encrypted)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(path)
    }

    /// Read an account back from an encrypted keystore file.
    ///
    /// Fails with [`CryptoError::DecryptFailed`] on a wrong password or a
    /// corrupted file (AEAD tag mismatch).
    pub fn read_from_file(path: &Path, password: &[u8]) -> Result<Self, CryptoError> {
        let encrypted = fs::read(path)?;
        let mut plaintext = decrypt_with_password(&encrypted, password)?;
        let record: KeyRecord = serde_json::from_slice(&plaintext)?;
        plaintext.zeroize();
        Self::from_key_record(&record)
    }
}
