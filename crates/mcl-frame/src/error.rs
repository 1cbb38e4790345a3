/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The outbound queue has no consumer left.
    #[error("write queue closed")]
    QueueClosed,
}

impl From<mcl_transport::TransportError> for FrameError {
    fn from(err: mcl_transport::TransportError) -> Self {
        match err {
            mcl_transport::TransportError::Io(io) => FrameError::Io(io),
            mcl_transport::TransportError::Bind { source, .. }
            | mcl_transport::TransportError::Connect { source, .. }
            | mcl_transport::TransportError::Multicast { source, .. } => FrameError::Io(source),
            mcl_transport::TransportError::Shutdown => FrameError::ConnectionClosed,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
