//! TSL UMD v5: tally and under-monitor-display packets for broadcast gear.
//!
//! tslumd encodes and decodes TSL v5 packets, wraps them in the DLE/STX
//! envelope used on TCP, and moves them between senders and receivers.
//!
//! # Crate Structure
//!
//! - [`packet`]: Packet and display-message model with the binary codec
//! - [`frame`]: DLE/STX stream framing (blocking reader/writer, `tokio` codec behind `async`)
//! - [`transport`]: Endpoints and TCP/UDP socket setup
//! - [`session`]: Sender and receiver (behind the `session` feature)

/// Re-export packet types.
pub mod packet {
    pub use tslumd_packet::*;
}

/// Re-export frame types.
pub mod frame {
    pub use tslumd_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use tslumd_transport::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use tslumd_session::*;
}
