/// Errors that can occur during framing and de-framing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A lone `0xFE` inside a frame, rejected in strict mode.
    #[error("unescaped 0xFE at payload offset {offset}")]
    BareEscape { offset: usize },

    /// A frame (or unsynchronised input) exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed with no further frame available.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
