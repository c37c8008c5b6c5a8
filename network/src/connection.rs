//! Length-prefixed framing over TCP.
//!
//! Frames are a 4-byte big-endian payload length followed by the
//! canonical-JSON encoding of a [`WireMessage`]. A peer sending an
//! oversized frame is disconnected.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::NetworkError;
use crate::wire::WireMessage;

/// Maximum message body size.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// Idle read timeout for peer connections.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for outbound TCP connection attempts.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Write one framed message.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &WireMessage,
) -> Result<(), NetworkError> {
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge(payload.len()));
    }
    writer
        .write_all(&(payload.len() as u32).to_be_bytes())
        .await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message, waiting at most `timeout` between frames.
///
/// Returns `Ok(None)` on a clean end-of-stream at a frame boundary; a
/// truncated frame surfaces as an error.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Option<WireMessage>, NetworkError> {
    let mut len_buf = [0u8; 4];
    match tokio::time::timeout(timeout, reader.read_exact(&mut len_buf)).await {
        Err(_) => return Err(NetworkError::Timeout),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Ok(Err(e)) => return Err(e.into()),
        Ok(Ok(_)) => {}
    }

    let body_len = u32::from_be_bytes(len_buf) as usize;
    if body_len > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge(body_len));
    }

    let mut body = vec![0u8; body_len];
    match tokio::time::timeout(timeout, reader.read_exact(&mut body)).await {
        Err(_) => return Err(NetworkError::Timeout),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(NetworkError::UnexpectedEof)
        }
        Ok(Err(e)) => return Err(e.into()),
        Ok(Ok(_)) => {}
    }

    Ok(Some(serde_json::from_slice(&body)?))
}

/// Dial a peer with the standard connect timeout.
pub async fn connect(addr: &str) -> Result<TcpStream, NetworkError> {
    tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| NetworkError::ConnectTimeout(addr.to_string()))?
        .map_err(NetworkError::from)
}

/// One-shot request: dial, send a single frame, read a single response.
pub async fn request(addr: &str, msg: &WireMessage) -> Result<WireMessage, NetworkError> {
    let mut stream = connect(addr).await?;
    write_frame(&mut stream, msg).await?;
    read_frame(&mut stream, READ_TIMEOUT)
        .await?
        .ok_or(NetworkError::UnexpectedEof)
}
