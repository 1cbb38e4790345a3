use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};

/// Frame header: category (1) + index (2) + length (4) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Default maximum payload size: 16 MiB.
///
/// The limit is checked against the announced length before the payload is
/// buffered. On a client read channel a frame over the limit is a fatal
/// framing error: the stream cannot be resynchronised, so the session ends.
/// The largest frames a system sends are scope and FFT waveforms at
/// 8 bytes per sample per returned channel plus a few kilobytes of
/// metadata. A long multi-channel capture that approaches 16 MiB needs a
/// larger [`FrameConfig::max_payload_size`].
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A framed message addressed to one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Parameter group (see [`crate::category`]).
    pub category: u8,
    /// Parameter index within the category.
    pub index: u16,
    /// The encoded parameter value.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(category: u8, index: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            category,
            index,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format (all fields big-endian):
/// ```text
/// ┌──────────┬───────────┬───────────┬─────────────────┐
/// │ Category │ Index     │ Length    │ Payload         │
/// │ (1B)     │ (2B BE)   │ (4B BE)   │ (Length bytes)  │
/// └──────────┴───────────┴───────────┴─────────────────┘
/// ```
pub fn encode_frame(category: u8, index: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(category);
    dst.put_u16(index);
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    AwaitHeader,
    AwaitBody {
        category: u8,
        index: u16,
        length: usize,
    },
}

/// Incremental frame decoder.
///
/// Alternates between waiting for a 7-byte header and waiting for exactly
/// the announced number of payload bytes. Bytes may arrive split at any
/// boundary; nothing is consumed from the buffer until a whole header or a
/// whole body is available.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    max_payload: usize,
}

impl FrameDecoder {
    pub fn new(max_payload: usize) -> Self {
        Self {
            state: DecodeState::AwaitHeader,
            max_payload,
        }
    }

    /// Decode the next frame from `src`.
    ///
    /// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            match self.state {
                DecodeState::AwaitHeader => {
                    if src.len() < HEADER_SIZE {
                        return Ok(None);
                    }
                    let category = src.get_u8();
                    let index = src.get_u16();
                    let length = src.get_u32() as usize;
                    if length > self.max_payload {
                        return Err(FrameError::PayloadTooLarge {
                            size: length,
                            max: self.max_payload,
                        });
                    }
                    self.state = DecodeState::AwaitBody {
                        category,
                        index,
                        length,
                    };
                }
                DecodeState::AwaitBody {
                    category,
                    index,
                    length,
                } => {
                    if src.len() < length {
                        src.reserve(length - src.len());
                        return Ok(None);
                    }
                    let payload = src.split_to(length).freeze();
                    self.state = DecodeState::AwaitHeader;
                    trace!(category, index, length, "frame decoded");
                    return Ok(Some(Frame {
                        category,
                        index,
                        payload,
                    }));
                }
            }
        }
    }

    /// True when no partial frame is pending.
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::AwaitHeader
    }

    /// Update maximum payload size for subsequent headers.
    pub fn set_max_payload(&mut self, max_payload: usize) {
        self.max_payload = max_payload;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

/// Decode one frame from a buffer holding at least one whole frame.
///
/// Stateless convenience over [`FrameDecoder`]: returns `Ok(None)` and
/// consumes nothing when the frame is incomplete.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }
    let length = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;
    if length > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: max_payload,
        });
    }
    if src.len() < HEADER_SIZE + length {
        return Ok(None);
    }
    FrameDecoder::new(max_payload).decode(src)
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: [`DEFAULT_MAX_PAYLOAD`].
    ///
    /// Exceeding it on read ends the stream with
    /// [`FrameError::PayloadTooLarge`].
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
