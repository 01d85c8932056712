use std::time::Duration;

/// Errors that can occur in sender and receiver operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error: bind, connect, accept or socket I/O.
    #[error("transport error: {0}")]
    Transport(#[from] tslumd_transport::TransportError),

    /// Stream framing error.
    #[error("frame error: {0}")]
    Frame(#[from] tslumd_frame::FrameError),

    /// Packet encode or decode error.
    #[error("packet error: {0}")]
    Packet(#[from] tslumd_packet::PacketError),

    /// A connection stayed silent longer than the configured idle timeout.
    #[error("connection idle for {0:?}")]
    IdleTimeout(Duration),
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Transport(err.into())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
