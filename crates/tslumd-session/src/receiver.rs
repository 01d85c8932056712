use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tslumd_frame::{deframe_eof, FrameConfig, TslCodec};
use tslumd_transport::{bind_datagram, StreamListener, TransportKind};

use crate::error::{Result, SessionError};
use crate::handler::{Delivery, PacketHandler};

/// Largest datagram the receiver reads; anything beyond is truncated by the OS.
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Listen-side configuration.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub transport: TransportKind,
    /// Local address to bind. Port 0 picks an ephemeral port.
    pub bind: SocketAddr,
    /// Framing limits for TCP connections.
    pub frame: FrameConfig,
    /// Close a TCP connection that receives no bytes for this long. A frame
    /// still waiting for its boundary is delivered before the close.
    pub idle_timeout: Option<Duration>,
}

impl ReceiverConfig {
    /// Listen on all IPv4 interfaces at `port`.
    pub fn new(transport: TransportKind, port: u16) -> Self {
        Self {
            transport,
            bind: SocketAddr::from(([0, 0, 0, 0], port)),
            frame: FrameConfig::default(),
            idle_timeout: None,
        }
    }

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }
}

/// A running TSL listener.
///
/// Dropping the receiver, or calling [`Receiver::shutdown`], stops the
/// listener and every connection task it spawned.
pub struct Receiver {
    transport: TransportKind,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Receiver {
    /// Bind and start delivering packets to `handler`.
    pub async fn start<H: PacketHandler>(config: ReceiverConfig, handler: H) -> Result<Self> {
        let handler: Arc<dyn PacketHandler> = Arc::new(handler);
        let cancel = CancellationToken::new();
        let transport = config.transport;

        let (local_addr, task) = match transport {
            TransportKind::Tcp => {
                let listener = StreamListener::bind(config.bind).await?;
                let local_addr = listener.local_addr();
                let task = tokio::spawn(accept_loop(listener, config, handler, cancel.clone()));
                (local_addr, task)
            }
            TransportKind::Udp => {
                let socket = bind_datagram(config.bind).await?;
                let local_addr = socket.local_addr()?;
                let task = tokio::spawn(datagram_loop(socket, handler, cancel.clone()));
                (local_addr, task)
            }
        };

        info!(%transport, %local_addr, "receiver started");

        Ok(Self {
            transport,
            local_addr,
            cancel,
            task: Some(task),
        })
    }

    /// Bind and deliver packets through a channel instead of a callback.
    pub async fn channel(
        config: ReceiverConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Delivery>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let receiver = Self::start(config, move |delivery: Delivery| {
            // A closed channel means the consumer is gone; nothing to report to.
            let _ = tx.send(delivery);
        })
        .await?;
        Ok((receiver, rx))
    }

    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Stop listening, close all connections and wait for the listener task.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "receiver task ended abnormally");
            }
        }
        info!(transport = %self.transport, local_addr = %self.local_addr, "receiver stopped");
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop(
    listener: StreamListener,
    config: ReceiverConfig,
    handler: Arc<dyn PacketHandler>,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, remote)) => {
                info!(%remote, "tcp client connected");
                tokio::spawn(connection_loop(
                    stream,
                    remote,
                    config.frame.clone(),
                    config.idle_timeout,
                    Arc::clone(&handler),
                    cancel.child_token(),
                ));
            }
            Err(err) => {
                warn!(error = %err, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }

    debug!(local_addr = %listener.local_addr(), "stopped accepting connections");
}

async fn connection_loop(
    stream: TcpStream,
    remote: SocketAddr,
    frame: FrameConfig,
    idle_timeout: Option<Duration>,
    handler: Arc<dyn PacketHandler>,
    cancel: CancellationToken,
) {
    let mut frames = FramedRead::new(
        ActivityStream::new(stream),
        TslCodec::with_config(frame.clone()),
    );
    let mut delivered = 0u64;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = next_frame(&mut frames, idle_timeout) => next,
        };

        match next {
            Ok(Some(payload)) => {
                delivered += 1;
                deliver(handler.as_ref(), remote, TransportKind::Tcp, payload);
            }
            Ok(None) => break,
            Err(SessionError::IdleTimeout(limit)) => {
                info!(%remote, ?limit, "closing idle tcp connection");
                delivered += flush_pending(&mut frames, &frame, remote, handler.as_ref());
                break;
            }
            Err(err) => {
                warn!(%remote, error = %err, "tcp read failed; closing connection");
                handler.handle(Delivery {
                    source: remote,
                    transport: TransportKind::Tcp,
                    payload: Bytes::new(),
                    packet: Err(err),
                });
                break;
            }
        }
    }

    info!(%remote, packets = delivered, "tcp client disconnected");
}

async fn next_frame(
    frames: &mut FramedRead<ActivityStream, TslCodec>,
    idle_timeout: Option<Duration>,
) -> Result<Option<Bytes>> {
    let Some(limit) = idle_timeout else {
        return frames.next().await.transpose().map_err(SessionError::from);
    };

    loop {
        let deadline = frames.get_ref().last_read + limit;
        match tokio::time::timeout_at(deadline, frames.next()).await {
            Ok(item) => return item.transpose().map_err(SessionError::from),
            // Bytes arrived but no frame completed yet; the deadline moves.
            Err(_) if frames.get_ref().last_read + limit > Instant::now() => continue,
            Err(_) => return Err(SessionError::IdleTimeout(limit)),
        }
    }
}

/// Deliver whatever frame is still buffered when a connection is closed from
/// this side. Returns the number of deliveries made.
fn flush_pending(
    frames: &mut FramedRead<ActivityStream, TslCodec>,
    config: &FrameConfig,
    remote: SocketAddr,
    handler: &dyn PacketHandler,
) -> u64 {
    let mut flushed = 0;
    loop {
        match deframe_eof(frames.read_buffer_mut(), config) {
            Ok(Some(payload)) => {
                flushed += 1;
                deliver(handler, remote, TransportKind::Tcp, payload);
            }
            Ok(None) => return flushed,
            Err(err) => {
                warn!(%remote, error = %err, "pending frame rejected on close");
                handler.handle(Delivery {
                    source: remote,
                    transport: TransportKind::Tcp,
                    payload: Bytes::new(),
                    packet: Err(err.into()),
                });
                return flushed;
            }
        }
    }
}

/// TCP stream that records when it last produced bytes.
struct ActivityStream {
    inner: TcpStream,
    last_read: Instant,
}

impl ActivityStream {
    fn new(inner: TcpStream) -> Self {
        Self {
            inner,
            last_read: Instant::now(),
        }
    }
}

impl AsyncRead for ActivityStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let polled = Pin::new(&mut self.inner).poll_read(cx, buf);
        if matches!(polled, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            self.last_read = Instant::now();
        }
        polled
    }
}

async fn datagram_loop(
    socket: UdpSocket,
    handler: Arc<dyn PacketHandler>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => received,
        };

        match received {
            Ok((n, source)) => {
                let payload = Bytes::copy_from_slice(&buf[..n]);
                deliver(handler.as_ref(), source, TransportKind::Udp, payload);
            }
            // e.g. ICMP port-unreachable surfacing on some platforms
            Err(err) => warn!(error = %err, "udp receive failed"),
        }
    }

    debug!("stopped receiving datagrams");
}

fn deliver(
    handler: &dyn PacketHandler,
    source: SocketAddr,
    transport: TransportKind,
    payload: Bytes,
) {
    let packet = tslumd_packet::decode(&payload);
    match &packet {
        Ok(packet) => debug!(
            %source,
            %transport,
            screen = packet.screen,
            messages = packet.messages.len(),
            "packet received"
        ),
        Err(err) => warn!(%source, %transport, error = %err, "packet failed to decode"),
    }

    handler.handle(Delivery {
        source,
        transport,
        payload,
        packet: packet.map_err(SessionError::from),
    });
}
