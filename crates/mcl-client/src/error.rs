use std::time::Duration;

/// Errors that can occur while connecting to or talking with an MCL system.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error (socket connect, bind, I/O).
    #[error("transport error: {0}")]
    Transport(#[from] mcl_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] mcl_frame::FrameError),

    /// Parameter lookup, validation, or decode error.
    #[error(transparent)]
    Param(#[from] mcl_params::ParamError),

    /// The session is gone: the connection was lost or closed.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// `connect` was called on a client that already has a session.
    #[error("client already connected")]
    AlreadyConnected,

    /// The readiness barrier did not open in time.
    #[error("system not ready after {0:?}")]
    Timeout(Duration),

    /// A background loop thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;
