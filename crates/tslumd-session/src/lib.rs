//! TSL UMD v5 senders and receivers.
//!
//! This is the layer applications use. A [`Sender`] pushes packets to one
//! display over TCP (framed) or UDP (one datagram per packet). A
//! [`Receiver`] listens, runs one task per TCP connection, and hands every
//! decoded packet, or the reason it could not be decoded, to a handler.

pub mod error;
pub mod handler;
pub mod receiver;
pub mod sender;

pub use error::{Result, SessionError};
pub use handler::{Delivery, PacketHandler};
pub use receiver::{Receiver, ReceiverConfig, MAX_DATAGRAM_SIZE};
pub use sender::Sender;
