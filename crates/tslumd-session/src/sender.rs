use std::net::SocketAddr;

use bytes::Bytes;
use futures_util::SinkExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio_util::codec::FramedWrite;
use tracing::{debug, info};
use tslumd_frame::{FrameConfig, FrameError, TslCodec};
use tslumd_packet::Packet;
use tslumd_transport::{connect_datagram, connect_stream, Endpoint, TransportError, TransportKind};

use crate::error::{Result, SessionError};

enum Link {
    Stream(FramedWrite<TcpStream, TslCodec>),
    Datagram(UdpSocket),
}

/// Sends packets to one TSL display.
///
/// Holds exactly one connection. A failed send is returned to the caller;
/// there is no retry and no reconnect.
pub struct Sender {
    endpoint: Endpoint,
    remote: SocketAddr,
    link: Link,
}

impl Sender {
    /// Connect to `endpoint` with default framing.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        Self::connect_with_config(endpoint, FrameConfig::default()).await
    }

    /// Connect with explicit framing configuration (TCP only).
    pub async fn connect_with_config(endpoint: &Endpoint, frame: FrameConfig) -> Result<Self> {
        let (link, remote) = match endpoint.transport {
            TransportKind::Tcp => {
                let (stream, remote) = connect_stream(endpoint).await?;
                let sink = FramedWrite::new(stream, TslCodec::with_config(frame));
                (Link::Stream(sink), remote)
            }
            TransportKind::Udp => {
                let (socket, remote) = connect_datagram(endpoint).await?;
                (Link::Datagram(socket), remote)
            }
        };

        info!(%endpoint, %remote, "sender connected");

        Ok(Self {
            endpoint: endpoint.clone(),
            remote,
            link,
        })
    }

    /// Send already-encoded packet bytes.
    ///
    /// Over TCP the bytes are framed first; over UDP they go out unmodified
    /// as a single datagram.
    pub async fn send(&mut self, packet: &[u8]) -> Result<()> {
        match &mut self.link {
            Link::Stream(sink) => {
                sink.send(Bytes::copy_from_slice(packet))
                    .await
                    .map_err(stream_error)?;
            }
            Link::Datagram(socket) => {
                let sent = socket.send(packet).await?;
                if sent != packet.len() {
                    return Err(TransportError::Io(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        format!("datagram truncated ({sent} of {} bytes)", packet.len()),
                    ))
                    .into());
                }
            }
        }

        debug!(remote = %self.remote, size = packet.len(), "packet sent");
        Ok(())
    }

    /// Encode and send a packet.
    pub async fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        let bytes = tslumd_packet::encode(packet)?;
        self.send(&bytes).await
    }

    /// Flush and release the connection.
    pub async fn close(self) -> Result<()> {
        if let Link::Stream(mut sink) = self.link {
            sink.close().await.map_err(stream_error)?;
        }
        debug!(endpoint = %self.endpoint, "sender closed");
        Ok(())
    }

    /// Resolved address of the display.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Socket failures under the framed sink are connection failures, not framing ones.
fn stream_error(err: FrameError) -> SessionError {
    match err {
        FrameError::Io(source) => TransportError::Io(source).into(),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tslumd_frame::frame_to_bytes;
    use tslumd_packet::{DisplayMessage, PacketError, Tally, MAX_TEXT_LEN};

    use super::*;

    fn cam(index: u16, text: &'static str) -> Packet {
        Packet::new(0).with_message(
            DisplayMessage::new(index, text)
                .with_tallies(Tally::Green, Tally::Red, Tally::Off)
                .with_brightness(3),
        )
    }

    #[tokio::test]
    async fn tcp_send_frames_packet() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let reader = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut wire = Vec::new();
            stream.read_to_end(&mut wire).await.unwrap();
            wire
        });

        let endpoint = Endpoint::new(TransportKind::Tcp, "127.0.0.1", port);
        let mut sender = Sender::connect(&endpoint).await.unwrap();
        assert_eq!(sender.remote_addr().port(), port);

        let packet = cam(3, "CAM 55");
        sender.send_packet(&packet).await.unwrap();
        sender.send(&[0xFE]).await.unwrap();
        sender.close().await.unwrap();

        let wire = reader.await.unwrap();
        let mut expected = frame_to_bytes(&tslumd_packet::encode(&packet).unwrap()).to_vec();
        expected.extend_from_slice(&[0xFE, 0x02, 0xFE, 0xFE]);
        assert_eq!(wire, expected);
    }

    #[tokio::test]
    async fn udp_send_is_unframed() {
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        let endpoint = Endpoint::new(TransportKind::Udp, "127.0.0.1", port);
        let mut sender = Sender::connect(&endpoint).await.unwrap();

        let packet = cam(1, "CAM 1");
        sender.send_packet(&packet).await.unwrap();

        let mut buf = [0u8; 256];
        let (n, _) = socket.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], tslumd_packet::encode(&packet).unwrap().as_ref());
        sender.close().await.unwrap();
    }

    #[tokio::test]
    async fn encode_error_surfaces_before_write() {
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let endpoint = Endpoint::new(TransportKind::Udp, "127.0.0.1", port);
        let mut sender = Sender::connect(&endpoint).await.unwrap();

        let packet =
            Packet::new(0).with_message(DisplayMessage::new(0, vec![b'x'; MAX_TEXT_LEN + 1]));
        let err = sender.send_packet(&packet).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Packet(PacketError::TextTooLong { .. })
        ));
    }

    #[tokio::test]
    async fn write_to_closed_peer_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let endpoint = Endpoint::new(TransportKind::Tcp, "127.0.0.1", port);
        let mut sender = Sender::connect(&endpoint).await.unwrap();
        let (peer, _) = listener.accept().await.unwrap();
        drop(peer);

        let packet = cam(1, "CAM 1");
        let mut failure = None;
        for _ in 0..200 {
            if let Err(err) = sender.send_packet(&packet).await {
                failure = Some(err);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let err = failure.expect("writes to a closed peer should eventually fail");
        assert!(
            matches!(err, SessionError::Transport(TransportError::Io(_))),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn frame_errors_other_than_io_stay_frame_errors() {
        let err = stream_error(FrameError::FrameTooLarge { size: 9, max: 4 });
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::FrameTooLarge { .. })
        ));

        let err = stream_error(FrameError::Io(std::io::Error::from(
            std::io::ErrorKind::BrokenPipe,
        )));
        assert!(matches!(err, SessionError::Transport(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn connect_refused_surfaces_transport_error() {
        let port = {
            let scratch = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            scratch.local_addr().unwrap().port()
        };

        let endpoint = Endpoint::new(TransportKind::Tcp, "127.0.0.1", port);
        let err = match Sender::connect(&endpoint).await {
            Ok(_) => panic!("connect to a closed port should fail"),
            Err(err) => err,
        };
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Connect { .. })
        ));
    }
}
