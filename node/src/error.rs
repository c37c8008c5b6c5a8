use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("chain error: {0}")]
    Chain(#[from] keel_chain::ChainError),

    #[error("crypto error: {0}")]
    Crypto(#[from] keel_crypto::CryptoError),

    #[error("store error: {0}")]
    Store(#[from] keel_store::StoreError),

    #[error("network error: {0}")]
    Network(#[from] keel_network::NetworkError),

    #[error("invalid genesis signature")]
    InvalidGenesis,

    #[error("genesis unavailable: {0}")]
    GenesisUnavailable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("RPC server error: {0}")]
    Rpc(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
