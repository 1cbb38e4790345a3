use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameConfig, FrameDecoder};
use crate::error::{FrameError, Result};

/// `tokio_util` codec for MCL frames.
///
/// Wraps the same two-state [`FrameDecoder`] used by the blocking reader, so
/// it can back a `Framed<TcpStream, MclCodec>` in async applications.
#[derive(Debug, Clone)]
pub struct MclCodec {
    decoder: FrameDecoder,
    max_payload_size: usize,
}

impl MclCodec {
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(config.max_payload_size),
            max_payload_size: config.max_payload_size,
        }
    }
}

impl Default for MclCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MclCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        self.decoder.decode(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decoder.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() && self.decoder.is_idle() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Frame> for MclCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(frame.category, frame.index, &frame.payload, dst)
    }
}
