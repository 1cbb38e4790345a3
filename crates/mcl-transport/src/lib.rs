//! Socket layer for the MCL lock-in measurement system.
//!
//! Provides the two kinds of sockets the protocol needs:
//! - TCP channels (read channel on port 46000, write channel on 46001)
//! - UDP multicast sockets for system discovery
//!
//! This is the lowest layer of the client. Framing, the parameter registry,
//! and session management build on the [`TcpChannel`] type provided here.

pub mod error;
pub mod tcp;
pub mod udp;

pub use error::{Result, TransportError};
pub use tcp::{TcpChannel, READ_PORT, WRITE_PORT};
pub use udp::{send_multicast, MulticastListener, DISCOVERY_GROUP};
