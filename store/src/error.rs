use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("genesis not found in block store")]
    GenesisNotFound,

    #[error("partial trailing record in block log")]
    PartialRecord,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
