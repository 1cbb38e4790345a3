use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use mcl_transport::TcpChannel;
use tracing::trace;

use crate::codec::{Frame, FrameConfig, FrameDecoder};
use crate::error::{FrameError, Result};

/// Default number of bytes requested from the stream per read.
///
/// Waveform frames run to hundreds of kilobytes, so reads are large.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Pulls frames off a blocking byte stream.
///
/// Bytes past the end of one frame stay buffered for the next call, so a
/// single read may yield several frames and a frame may span many reads.
pub struct FrameReader<T> {
    source: T,
    pending: BytesMut,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
}

impl<T: Read> FrameReader<T> {
    pub fn new(source: T) -> Self {
        Self::with_config(source, FrameConfig::default())
    }

    pub fn with_config(source: T, config: FrameConfig) -> Self {
        Self {
            source,
            pending: BytesMut::new(),
            decoder: FrameDecoder::new(config.max_payload_size),
            chunk: vec![0; READ_CHUNK_SIZE],
        }
    }

    /// Block until one whole frame is available.
    ///
    /// End of stream, whether between frames or inside one, is
    /// [`FrameError::ConnectionClosed`].
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.pending)? {
                return Ok(frame);
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        let n = loop {
            match self.source.read(&mut self.chunk) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        };
        if n == 0 {
            return Err(FrameError::ConnectionClosed);
        }
        trace!(len = n, buffered = self.pending.len(), "stream chunk");
        self.pending.extend_from_slice(&self.chunk[..n]);
        Ok(())
    }

    /// Bytes requested per read. Clamped to at least 1.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk.resize(chunk_size.max(1), 0);
    }
}

impl FrameReader<TcpChannel> {
    /// Reader over a TCP channel with the configured read timeout applied.
    pub fn with_config_tcp(channel: TcpChannel, config: FrameConfig) -> Result<Self> {
        channel.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(channel, config))
    }
}
