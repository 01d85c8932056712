/// Errors that can occur while encoding or decoding packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// A display message's text is longer than the protocol allows.
    #[error("text too long for message {index} ({len} bytes, max {max})")]
    TextTooLong { index: u16, len: usize, max: usize },

    /// The encoded packet does not fit the 16-bit byte count.
    #[error("packet too long ({len} bytes after byte count, max {max})")]
    PacketTooLong { len: usize, max: usize },

    /// Fewer bytes than the fixed packet header.
    #[error("packet too short ({len} bytes, need at least {min})")]
    TooShort { len: usize, min: usize },

    /// The packet byte count disagrees with the bytes actually present.
    #[error("byte count mismatch: header says {declared}, got {actual}")]
    LengthMismatch { declared: u16, actual: usize },

    /// A message is flagged as control data, which is not supported.
    #[error("control data in message {index} is not supported")]
    UnsupportedControlData { index: u16 },

    /// A message header or its text runs past the end of the packet.
    #[error("packet truncated at offset {offset} (need {needed} bytes, {available} left)")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

pub type Result<T> = std::result::Result<T, PacketError>;
