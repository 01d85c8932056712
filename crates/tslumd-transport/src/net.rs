use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::kind::Endpoint;

/// Resolve an endpoint to the first socket address its host maps to.
pub async fn resolve(endpoint: &Endpoint) -> Result<SocketAddr> {
    let authority = endpoint.authority();
    let mut addrs = tokio::net::lookup_host(authority.clone())
        .await
        .map_err(|source| TransportError::Connect {
            addr: authority.clone(),
            source,
        })?;

    addrs.next().ok_or_else(|| TransportError::Connect {
        addr: authority,
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no address"),
    })
}

/// TCP listener for stream receivers.
pub struct StreamListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl StreamListener {
    /// Bind and listen on `addr`. Port 0 picks an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!(%local_addr, "listening for tcp connections");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, remote) = self.listener.accept().await.map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%remote, "accepted connection");
        Ok((stream, remote))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Bind a UDP socket for datagram receivers.
pub async fn bind_datagram(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!(local_addr = %socket.local_addr()?, "listening for udp datagrams");
    Ok(socket)
}

/// Open a TCP connection to `endpoint`.
pub async fn connect_stream(endpoint: &Endpoint) -> Result<(TcpStream, SocketAddr)> {
    let remote = resolve(endpoint).await?;
    let stream = TcpStream::connect(remote)
        .await
        .map_err(|source| TransportError::Connect {
            addr: remote.to_string(),
            source,
        })?;
    stream.set_nodelay(true)?;
    debug!(%remote, "connected over tcp");
    Ok((stream, remote))
}

/// Create a UDP socket connected to `endpoint`, so plain `send` targets it.
pub async fn connect_datagram(endpoint: &Endpoint) -> Result<(UdpSocket, SocketAddr)> {
    let remote = resolve(endpoint).await?;
    let local: SocketAddr = if remote.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };

    let socket = UdpSocket::bind(local)
        .await
        .map_err(|source| TransportError::Bind {
            addr: local.to_string(),
            source,
        })?;
    socket
        .connect(remote)
        .await
        .map_err(|source| TransportError::Connect {
            addr: remote.to_string(),
            source,
        })?;
    debug!(%remote, "udp socket connected");
    Ok((socket, remote))
}
