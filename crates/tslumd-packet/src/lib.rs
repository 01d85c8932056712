//! TSL UMD v5 packet codec.
//!
//! A packet carries a screen address and any number of display messages,
//! each updating one UMD slot with text, three tally lamps and a brightness
//! level. Encoding and decoding are pure functions over byte slices; framing
//! for stream transports lives in `tslumd-frame`.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{decode, encode, MESSAGE_HEADER_SIZE, PACKET_HEADER_SIZE};
pub use error::{PacketError, Result};
pub use message::{DisplayMessage, Packet, Tally, TextEncoding, MAX_TEXT_LEN};
