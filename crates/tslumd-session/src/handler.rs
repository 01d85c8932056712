use std::net::SocketAddr;

use bytes::Bytes;
use tslumd_packet::Packet;
use tslumd_transport::TransportKind;

use crate::error::SessionError;

/// One received packet, or the reason it could not be received.
#[derive(Debug)]
pub struct Delivery {
    /// Address of the sender (TCP peer or UDP source).
    pub source: SocketAddr,
    /// Transport the bytes arrived on.
    pub transport: TransportKind,
    /// Raw packet bytes after de-framing. Empty when framing itself failed.
    pub payload: Bytes,
    /// The decoded packet, or the packet or frame error.
    pub packet: Result<Packet, SessionError>,
}

impl Delivery {
    pub fn is_ok(&self) -> bool {
        self.packet.is_ok()
    }
}

/// Receives every delivery from a [`Receiver`](crate::Receiver).
///
/// Called from the connection's own task; deliveries from one TCP
/// connection arrive in send order, with no ordering across connections.
/// Implemented for any `Fn(Delivery)` closure.
pub trait PacketHandler: Send + Sync + 'static {
    fn handle(&self, delivery: Delivery);
}

impl<F> PacketHandler for F
where
    F: Fn(Delivery) + Send + Sync + 'static,
{
    fn handle(&self, delivery: Delivery) {
        self(delivery)
    }
}
