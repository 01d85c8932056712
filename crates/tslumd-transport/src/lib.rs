//! Network transport plumbing for TSL UMD v5.
//!
//! TSL v5 runs over two transports:
//! - TCP, where packets are DLE/STX framed (see `tslumd-frame`)
//! - UDP, where one datagram carries exactly one packet
//!
//! This is the lowest layer of tslumd. It owns address resolution, binding
//! and connecting; everything above it works on the sockets returned here.

pub mod error;
pub mod kind;
pub mod net;

pub use error::{Result, TransportError};
pub use kind::{Endpoint, TransportKind, DEFAULT_PORT};
pub use net::{bind_datagram, connect_datagram, connect_stream, resolve, StreamListener};
