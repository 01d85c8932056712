use std::fmt;
use std::str::FromStr;

use crate::error::TransportError;

/// Conventional TSL v5 port used when none is configured.
pub const DEFAULT_PORT: u16 = 8900;

/// Which socket type carries the packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Connection-oriented byte stream; packets are DLE/STX framed.
    Tcp,
    /// One datagram per packet, no framing.
    Udp,
}

impl TransportKind {
    /// Whether packets on this transport need stream framing.
    pub fn is_stream(self) -> bool {
        matches!(self, TransportKind::Tcp)
    }

    /// Lower-case name used in logs and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Udp => "udp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" | "stream" => Ok(TransportKind::Tcp),
            "udp" | "datagram" => Ok(TransportKind::Udp),
            _ => Err(TransportError::UnknownTransport(s.to_string())),
        }
    }
}

/// A remote TSL device: transport plus host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(transport: TransportKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            transport,
            host: host.into(),
            port,
        }
    }

    /// `host:port` form accepted by the resolver.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.transport, self.authority())
    }
}
