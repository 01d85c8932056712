use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{FrameError, Result};

/// Data link escape; doubled when it occurs in a payload.
pub const DLE: u8 = 0xFE;

/// Start of text; follows a single DLE to mark a frame start.
pub const STX: u8 = 0x02;

/// Start marker: `0xFE 0x02`.
pub const START_MARKER: [u8; 2] = [DLE, STX];

/// Largest TSL v5 packet (16-bit byte count plus the count itself), fully
/// stuffed, plus the start marker.
pub const DEFAULT_MAX_FRAME_SIZE: usize = START_MARKER.len() + 2 * (u16::MAX as usize + 2);

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum size of a frame on the wire, marker included.
    /// Unterminated input beyond this is an error rather than more buffering.
    pub max_frame_size: usize,
    /// Reject a `0xFE` that is neither doubled nor part of a start marker.
    /// When off, such a byte is passed through literally.
    pub strict: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            strict: false,
        }
    }
}

/// Frame a packet for a stream transport.
///
/// Wire format:
/// ```text
/// ┌────────────┬─────────────────────────────────────┐
/// │ 0xFE 0x02  │ packet bytes, each 0xFE sent twice  │
/// │ DLE  STX   │ (no terminator)                     │
/// └────────────┴─────────────────────────────────────┘
/// ```
pub fn frame(payload: &[u8], dst: &mut BytesMut) {
    let escapes = payload.iter().filter(|&&b| b == DLE).count();
    dst.reserve(START_MARKER.len() + payload.len() + escapes);
    dst.put_slice(&START_MARKER);

    for &b in payload {
        dst.put_u8(b);
        if b == DLE {
            dst.put_u8(DLE);
        }
    }
}

/// Frame a packet into a fresh buffer.
pub fn frame_to_bytes(payload: &[u8]) -> Bytes {
    let mut dst = BytesMut::new();
    frame(payload, &mut dst);
    dst.freeze()
}

/// Take the next complete frame from an accumulating receive buffer.
///
/// Returns `Ok(None)` when more bytes are needed. A frame counts as complete
/// only once the following start marker has arrived; use [`deframe_eof`]
/// when the stream has closed to release the last one. On success the
/// buffer is advanced to the next start marker.
///
/// Each call scans the pending frame from its start. Readers that feed a
/// buffer across many calls should hold a [`Deframer`] instead.
pub fn deframe(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Bytes>> {
    next_frame(src, config, false, &mut 0)
}

/// Like [`deframe`], for a stream that has reached end of input.
///
/// Once no further start marker can arrive, the bytes after the last marker
/// form the final frame. Anything before the first marker is discarded.
pub fn deframe_eof(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Bytes>> {
    next_frame(src, config, true, &mut 0)
}

/// Incremental de-framer for one receive buffer.
///
/// Remembers how far the pending frame has already been scanned, so bytes
/// trickling in one read at a time are each looked at once. The buffer
/// passed to [`decode`](Self::decode) must only grow between calls; call
/// [`reset`](Self::reset) after clearing or replacing it.
#[derive(Debug, Clone, Default)]
pub struct Deframer {
    config: FrameConfig,
    scanned: usize,
}

impl Deframer {
    pub fn new(config: FrameConfig) -> Self {
        Self { config, scanned: 0 }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Same contract as [`deframe`].
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        self.next(src, false)
    }

    /// Same contract as [`deframe_eof`].
    pub fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        self.next(src, true)
    }

    /// Forget the scan position.
    pub fn reset(&mut self) {
        self.scanned = 0;
    }

    fn next(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<Bytes>> {
        let result = next_frame(src, &self.config, eof, &mut self.scanned);
        if result.is_err() {
            self.scanned = 0;
        }
        result
    }
}

/// `scanned` is the offset, relative to the start marker at `src[0]`, up to
/// which the pending frame holds no boundary. It is zero whenever the buffer
/// does not begin with a frame that an earlier call already looked at.
fn next_frame(
    src: &mut BytesMut,
    config: &FrameConfig,
    eof: bool,
    scanned: &mut usize,
) -> Result<Option<Bytes>> {
    let Some(start) = find_marker(src) else {
        *scanned = 0;
        if eof {
            if !src.is_empty() {
                debug!(discarded = src.len(), "no start marker before end of stream");
            }
            src.clear();
        } else {
            check_size(src.len(), config)?;
        }
        return Ok(None);
    };

    if start > 0 {
        debug!(discarded = start, "skipping bytes before start marker");
        src.advance(start);
        *scanned = 0;
    }

    let end = match find_frame_end(src, *scanned, config, eof)? {
        Scan::End(end) => end,
        Scan::Pending(resume) => {
            *scanned = resume;
            check_size(src.len(), config)?;
            return Ok(None);
        }
    };
    check_size(end, config)?;

    let payload = unstuff(&src[START_MARKER.len()..end]);
    src.advance(end);
    *scanned = 0;
    Ok(Some(payload))
}

fn find_marker(src: &[u8]) -> Option<usize> {
    src.windows(START_MARKER.len())
        .position(|window| window == START_MARKER)
}

enum Scan {
    /// The frame ends where the next one starts, or at end of stream.
    End(usize),
    /// No boundary yet; a later scan may resume at this offset.
    Pending(usize),
}

/// Escape-aware scan for the end of the frame starting at `src[0]`.
///
/// A doubled DLE is stepped over as a unit, so a stuffed `0xFE` followed by
/// `0x02` in the payload is never mistaken for the next start marker.
/// Scanning starts at `from`, which must lie on a byte boundary an earlier
/// scan of the same frame returned.
fn find_frame_end(src: &[u8], from: usize, config: &FrameConfig, eof: bool) -> Result<Scan> {
    let mut i = from.max(START_MARKER.len());
    while i < src.len() {
        if src[i] != DLE {
            i += 1;
            continue;
        }

        match src.get(i + 1).copied() {
            Some(DLE) => i += 2,
            Some(STX) => return Ok(Scan::End(i)),
            // Could be half of a stuffed pair or of the next marker.
            None if !eof => return Ok(Scan::Pending(i)),
            _ if config.strict => {
                return Err(FrameError::BareEscape {
                    offset: i - START_MARKER.len(),
                })
            }
            _ => i += 1,
        }
    }

    Ok(if eof {
        Scan::End(src.len())
    } else {
        Scan::Pending(src.len())
    })
}

fn unstuff(raw: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        out.put_u8(b);
        if b == DLE && raw.get(i + 1) == Some(&DLE) {
            i += 2;
        } else {
            i += 1;
        }
    }
    out.freeze()
}

fn check_size(size: usize, config: &FrameConfig) -> Result<()> {
    if size > config.max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size,
            max: config.max_frame_size,
        });
    }
    Ok(())
}
