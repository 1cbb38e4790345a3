//! Client for MCL lock-in measurement systems.
//!
//! Talks the MCL binary protocol over two TCP channels, keeps a typed
//! registry of every system parameter, and dispatches streamed lock-in and
//! waveform data to observers.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP channels and UDP multicast sockets
//! - [`frame`]: 7-byte header framing and the outbound write queue
//! - [`params`]: parameter layouts, registry, typed views, stream decoders
//! - [`client`]: connection manager and discovery (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use mcl_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mcl_frame::*;
}

/// Re-export parameter types.
pub mod params {
    pub use mcl_params::*;
}

/// Re-export session types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use mcl_client::*;
}
