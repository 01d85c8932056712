use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::codec::{Deframer, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 1024;

/// Reads de-framed packets from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// The last frame of a stream is released when the stream reaches EOF.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    deframer: Deframer,
    eof: bool,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            deframer: Deframer::new(config),
            eof: false,
        }
    }

    /// Read the next complete frame payload (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` once the stream is
    /// exhausted and no frame remains.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = self.deframer.decode(&mut self.buf)? {
                return Ok(payload);
            }

            if self.eof {
                return self.deframer.decode_eof(&mut self.buf)?
                    .ok_or(FrameError::ConnectionClosed);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.eof = true;
                continue;
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.deframer.config()
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Bytes>;

    /// Yields frames until the stream closes; an error ends iteration.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Ok(payload) => Some(Ok(payload)),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => {
                self.eof = true;
                self.buf.clear();
                self.deframer.reset();
                Some(Err(err))
            }
        }
    }
}
