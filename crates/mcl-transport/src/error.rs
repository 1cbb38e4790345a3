use std::net::SocketAddr;

/// Errors that can occur in MCL transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a TCP channel to the system.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to bind a local socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to join the discovery multicast group.
    #[error("failed to join multicast group {group}: {source}")]
    Multicast {
        group: std::net::Ipv4Addr,
        source: std::io::Error,
    },

    /// An I/O error occurred on an open socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
