use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use mcl_transport::TcpChannel;
use tracing::trace;

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

/// Encodes frames onto a blocking byte stream.
///
/// The keepalive loop shares this type for its unframed counter words.
pub struct FrameWriter<T> {
    sink: T,
    scratch: BytesMut,
    max_payload: usize,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(sink: T) -> Self {
        Self::with_config(sink, FrameConfig::default())
    }

    pub fn with_config(sink: T, config: FrameConfig) -> Self {
        Self {
            sink,
            scratch: BytesMut::new(),
            max_payload: config.max_payload_size,
        }
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.category, frame.index, frame.payload.as_ref())
    }

    /// Encode `payload` for `(category, index)` and write it out whole.
    pub fn send(&mut self, category: u8, index: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }

        let mut encoded = std::mem::take(&mut self.scratch);
        encoded.clear();
        encode_frame(category, index, payload, &mut encoded)?;
        let result = self.write_raw(&encoded);
        self.scratch = encoded;
        result
    }

    /// Write bytes without a header. A timed-out write is an error, never
    /// a retry, so a stalled system cannot wedge the caller.
    pub fn write_raw(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            match self.sink.write(bytes) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => bytes = &bytes[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.sink.flush().map_err(FrameError::Io)?;
        trace!("write flushed");
        Ok(())
    }

    pub fn get_ref(&self) -> &T {
        &self.sink
    }

    pub fn into_inner(self) -> T {
        self.sink
    }
}

impl FrameWriter<TcpChannel> {
    /// Writer over a TCP channel with the configured write timeout applied.
    pub fn with_config_tcp(channel: TcpChannel, config: FrameConfig) -> Result<Self> {
        channel.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(channel, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        bytes: Vec<u8>,
        writes: usize,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.writes += 1;
            let n = buf.len().min(3);
            self.bytes.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn short_writes_are_completed() {
        let mut writer = FrameWriter::new(Recorder::default());
        writer.send(2, 90, &1.0f64.to_be_bytes()).unwrap();

        let recorder = writer.into_inner();
        assert_eq!(recorder.bytes.len(), 15);
        assert_eq!(&recorder.bytes[..7], &[2, 0, 90, 0, 0, 0, 8]);
        assert_eq!(recorder.writes, 5);
    }

    #[test]
    fn write_frame_matches_send() {
        let frame = Frame::new(0, 3, vec![9u8, 8, 7]);
        let mut a = FrameWriter::new(Vec::new());
        let mut b = FrameWriter::new(Vec::new());
        a.write_frame(&frame).unwrap();
        b.send(0, 3, &[9, 8, 7]).unwrap();
        assert_eq!(a.into_inner(), b.into_inner());
    }

    #[test]
    fn raw_bytes_are_unframed() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_raw(&7u32.to_be_bytes()).unwrap();
        assert_eq!(writer.get_ref().as_slice(), &[0, 0, 0, 7]);
    }

    #[test]
    fn oversized_payload_rejected_before_write() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Vec::new(), cfg);
        let err = writer.send(2, 107, &[0u8; 5]).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 5, max: 4 }));
        assert!(writer.get_ref().is_empty());
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Stalled;

    impl Write for Stalled {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stalled_sink_surfaces_instead_of_spinning() {
        let mut writer = FrameWriter::new(Stalled);
        let err = writer.write_raw(&0u32.to_be_bytes()).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn scratch_buffer_reused_between_frames() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.send(2, 90, &1.0f64.to_be_bytes()).unwrap();
        writer.send(2, 91, &2.0f64.to_be_bytes()).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 30);
        assert_eq!(&bytes[15..18], &[2, 0, 91]);
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(2, 44, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }
}
