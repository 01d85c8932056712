//! `tokio_util::codec` adapter for DLE/STX framing.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{frame, Deframer, FrameConfig};
use crate::error::FrameError;

/// Frames outgoing packets and de-frames incoming ones on a TCP stream.
///
/// Decoded items are raw packet bytes; the trailing frame of a stream is
/// released from `decode_eof` when the peer closes the connection.
#[derive(Debug, Clone, Default)]
pub struct TslCodec {
    deframer: Deframer,
}

impl TslCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            deframer: Deframer::new(config),
        }
    }

    pub fn config(&self) -> &FrameConfig {
        self.deframer.config()
    }
}

impl Decoder for TslCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.deframer.decode(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.deframer.decode_eof(src)
    }
}

impl Encoder<Bytes> for TslCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        frame(&item, dst);

        let size = dst.len() - start;
        let max = self.config().max_frame_size;
        if size > max {
            dst.truncate(start);
            return Err(FrameError::FrameTooLarge { size, max });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, TslCodec::new());
        let mut stream = FramedRead::new(server, TslCodec::new());

        let writer = tokio::spawn(async move {
            sink.send(Bytes::from_static(b"first")).await.unwrap();
            sink.send(Bytes::from_static(&[0xFE, 0x02, 0xFE]))
                .await
                .unwrap();
            sink.send(Bytes::from_static(b"last")).await.unwrap();
        });

        let mut received = Vec::new();
        while let Some(item) = stream.next().await {
            received.push(item.unwrap());
        }
        writer.await.unwrap();

        assert_eq!(
            received,
            vec![
                Bytes::from_static(b"first"),
                Bytes::from_static(&[0xFE, 0x02, 0xFE]),
                Bytes::from_static(b"last"),
            ]
        );
    }

    #[tokio::test]
    async fn trickled_bytes_reassemble() {
        let (mut client, server) = tokio::io::duplex(8);
        let mut stream = FramedRead::new(server, TslCodec::new());

        let mut wire = BytesMut::new();
        frame(&[0x41, 0xFE, 0x42], &mut wire);
        frame(&[0xFE], &mut wire);

        let writer = tokio::spawn(async move {
            for byte in wire.iter() {
                client.write_all(&[*byte]).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.as_ref(), &[0x41, 0xFE, 0x42]);
        writer.await.unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.as_ref(), &[0xFE]);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn encoder_rejects_oversized_frame_without_writing() {
        let mut codec = TslCodec::with_config(FrameConfig {
            max_frame_size: 4,
            ..FrameConfig::default()
        });
        let mut dst = BytesMut::from(&b"keep"[..]);

        let err = codec
            .encode(Bytes::from_static(b"too big"), &mut dst)
            .unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 9, max: 4 }));
        assert_eq!(dst.as_ref(), b"keep");
    }
}
