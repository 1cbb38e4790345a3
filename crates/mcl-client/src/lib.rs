//! Session layer of the MCL lock-in protocol.
//!
//! A [`Client`] owns the two TCP channels to one system and four loops:
//! keepalive on the read channel, frame consumption into the parameter
//! registry, an acknowledgement sink on the write channel, and the outbound
//! write drain. [`Client::connect`] returns once the system has published
//! its full configuration. [`find_systems`] locates systems by multicast.

pub mod client;
pub mod config;
pub mod connector;
pub mod discovery;
pub mod error;
mod readiness;

pub use client::Client;
pub use config::ClientConfig;
pub use connector::{connect, connect_with_config};
pub use discovery::{
    find_systems, find_systems_with_config, parse_reply, DiscoveryConfig, SystemDescriptor,
    DISCOVERY_PORTS, QUERY, REPLY_PREFIX,
};
pub use error::{ClientError, Result};
