/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to resolve or connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on an established socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport name is not one of `tcp`/`udp` (or `stream`/`datagram`).
    #[error("unsupported transport: {0}")]
    UnknownTransport(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
