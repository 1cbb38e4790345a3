//! Multicast discovery of MCL systems on the local network.
//!
//! A query is sent to the discovery group on each well-known port and
//! replies are collected on `port + 2`. Discovery never fails: sockets that
//! cannot be opened and replies that cannot be parsed are logged and
//! skipped, so the worst case is an empty result.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::thread;
use std::time::Duration;

use mcl_transport::{send_multicast, MulticastListener, DISCOVERY_GROUP};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Query datagram.
pub const QUERY: &[u8] = b"MCL?";

/// Prefix every reply starts with, followed by a JSON object.
pub const REPLY_PREFIX: &[u8] = b"MCL-REPLY:";

/// Ports the systems listen on for queries.
pub const DISCOVERY_PORTS: [u16; 2] = [1901, 1902];

/// Replies for a query sent to `port` arrive on `port + REPLY_PORT_OFFSET`.
pub const REPLY_PORT_OFFSET: u16 = 2;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub group: Ipv4Addr,
    pub ports: Vec<u16>,
    /// Listening stops once a window passes with no reply.
    pub window: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            group: DISCOVERY_GROUP,
            ports: DISCOVERY_PORTS.to_vec(),
            window: Duration::from_secs(1),
        }
    }
}

/// Self-description a system sends in its discovery reply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemDescriptor(pub serde_json::Map<String, serde_json::Value>);

impl SystemDescriptor {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// String-valued entry.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Decode one reply datagram. Anything malformed yields `None`.
pub fn parse_reply(datagram: &[u8]) -> Option<SystemDescriptor> {
    let body = datagram.strip_prefix(REPLY_PREFIX)?;
    let body = match body.iter().rposition(|b| *b != 0) {
        Some(end) => &body[..=end],
        None => body,
    };
    serde_json::from_slice(body).ok()
}

/// Find reachable systems with the default configuration.
pub fn find_systems() -> BTreeMap<IpAddr, SystemDescriptor> {
    find_systems_with_config(&DiscoveryConfig::default())
}

/// Find reachable systems, keyed by responder address.
pub fn find_systems_with_config(config: &DiscoveryConfig) -> BTreeMap<IpAddr, SystemDescriptor> {
    // Every listener is bound before the first query goes out.
    let listeners: Vec<MulticastListener> = config
        .ports
        .iter()
        .filter_map(|&port| {
            let reply_port = port.wrapping_add(REPLY_PORT_OFFSET);
            MulticastListener::bind(reply_port, config.group)
                .map_err(|err| warn!(port = reply_port, error = %err, "discovery listener unavailable"))
                .ok()
        })
        .collect();

    let window = config.window;
    let handles: Vec<_> = listeners
        .into_iter()
        .filter_map(|listener| {
            let port = listener.port();
            thread::Builder::new()
                .name(format!("mcl-discover-{port}"))
                .spawn(move || listener.collect(window))
                .map_err(|err| warn!(port, error = %err, "discovery listener thread failed"))
                .ok()
        })
        .collect();

    for &port in &config.ports {
        if let Err(err) = send_multicast(config.group, port, QUERY) {
            warn!(port, error = %err, "discovery query not sent");
        }
    }

    let mut systems = BTreeMap::new();
    for handle in handles {
        let datagrams = match handle.join() {
            Ok(Ok(datagrams)) => datagrams,
            Ok(Err(err)) => {
                warn!(error = %err, "discovery listener failed");
                continue;
            }
            Err(_) => {
                warn!("discovery listener panicked");
                continue;
            }
        };

        for (ip, datagram) in datagrams {
            match parse_reply(&datagram) {
                Some(descriptor) => {
                    systems.entry(ip).or_insert(descriptor);
                }
                None => debug!(%ip, len = datagram.len(), "ignoring non-reply datagram"),
            }
        }
    }

    debug!(found = systems.len(), "discovery finished");
    systems
}
