use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("signature error: {0}")]
    Signature(#[from] k256::ecdsa::Error),

    #[error("invalid recovery id")]
    InvalidRecoveryId,

    #[error("invalid key material: {0}")]
    Key(String),

    #[error("decryption failed: wrong password or corrupted data")]
    DecryptFailed,

    #[error("encrypted payload is truncated")]
    Truncated,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
