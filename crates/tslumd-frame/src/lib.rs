//! DLE/STX stream framing for TSL UMD v5.
//!
//! Over TCP every packet is wrapped as:
//! - a 2-byte start marker `0xFE 0x02` (DLE, STX)
//! - the packet bytes with every `0xFE` doubled
//!
//! There is no end marker and no length prefix. A frame ends where the next
//! start marker begins, or where the stream closes. The reader side keeps an
//! accumulating buffer and only releases a frame once that boundary is seen.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    deframe, deframe_eof, frame, frame_to_bytes, Deframer, FrameConfig, DEFAULT_MAX_FRAME_SIZE,
    DLE, START_MARKER, STX,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use tokio_codec::TslCodec;
