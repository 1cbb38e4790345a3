use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{Result, TransportError};

/// Multicast group the systems listen on for discovery queries.
pub const DISCOVERY_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Multicast TTL used for discovery queries.
pub const MULTICAST_TTL: u32 = 8;

/// Largest reply datagram accepted.
pub const MAX_DATAGRAM: usize = 1024;

/// A UDP socket listening for discovery replies on a fixed port.
///
/// Bound to all interfaces. Joining the multicast group is attempted but not
/// required: unicast replies to the bound port are still received when the
/// host has no multicast route.
pub struct MulticastListener {
    socket: UdpSocket,
    port: u16,
}

impl MulticastListener {
    /// Bind on `0.0.0.0:port` and join `group` on all interfaces.
    pub fn bind(port: u16, group: Ipv4Addr) -> Result<Self> {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let socket =
            UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let port = socket.local_addr()?.port();

        if let Err(source) = socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED) {
            let err = TransportError::Multicast { group, source };
            warn!(port, error = %err, "listening for unicast replies only");
        }

        debug!(port, %group, "discovery listener bound");
        Ok(Self { socket, port })
    }

    /// Local port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Receive datagrams until one `window` passes without any arriving.
    ///
    /// Read errors other than the window expiring end the listen early; what
    /// was collected so far is returned.
    pub fn collect(&self, window: Duration) -> Result<Vec<(IpAddr, Vec<u8>)>> {
        self.socket.set_read_timeout(Some(window))?;

        let mut datagrams = Vec::new();
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    trace!(port = self.port, %from, len = n, "discovery datagram");
                    datagrams.push((from.ip(), buf[..n].to_vec()));
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(err) => {
                    debug!(port = self.port, error = %err, "discovery listener stopped");
                    break;
                }
            }
        }

        Ok(datagrams)
    }
}

/// Send one query datagram to `group:port`.
pub fn send_multicast(group: Ipv4Addr, port: u16, payload: &[u8]) -> Result<()> {
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
    let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
    socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
    socket.send_to(payload, SocketAddrV4::new(group, port))?;
    debug!(%group, port, "discovery query sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_receives_unicast_datagram() {
        let listener = MulticastListener::bind(0, DISCOVERY_GROUP).unwrap();
        let port = listener.port();
        assert_ne!(port, 0);

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        sender
            .send_to(b"datagram", (Ipv4Addr::LOCALHOST, port))
            .unwrap();

        let datagrams = listener.collect(Duration::from_millis(200)).unwrap();
        assert_eq!(datagrams.len(), 1);
        assert_eq!(datagrams[0].0, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(datagrams[0].1, b"datagram");
    }

    #[test]
    fn listener_returns_empty_after_silent_window() {
        let listener = MulticastListener::bind(0, DISCOVERY_GROUP).unwrap();
        let started = std::time::Instant::now();
        let datagrams = listener.collect(Duration::from_millis(100)).unwrap();
        assert!(datagrams.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
