use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    #[error("read timeout")]
    Timeout,

    #[error("connect timeout to {0}")]
    ConnectTimeout(String),

    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
