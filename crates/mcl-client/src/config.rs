use std::time::Duration;

use mcl_frame::{FrameConfig, READ_CHUNK_SIZE};
use mcl_params::CONFIGURATION_COUNT;
use mcl_transport::READ_PORT;

/// Session timing and addressing.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Port of the read channel. The write channel is `base_port + 1`.
    pub base_port: u16,
    /// Upper bound on each TCP connect. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Interval between keepalive counters on the read channel.
    pub keepalive_interval: Duration,
    /// Pause between starting the loops and requesting configuration.
    pub startup_delay: Duration,
    /// How long `disconnect` waits for queued writes before closing sockets.
    pub shutdown_grace: Duration,
    /// Configuration indices `0..n` that must each arrive before `connect` returns.
    pub configuration_count: u16,
    /// Upper bound on the readiness wait. `None` waits until ready or disconnected.
    pub readiness_timeout: Option<Duration>,
    /// Bytes requested per read on the read channel.
    pub read_chunk_size: usize,
    /// Frame size limits for both channels.
    ///
    /// An inbound frame larger than `frame.max_payload_size` kills the
    /// session. Raise it for long multi-channel scope captures.
    pub frame: FrameConfig,
}

impl ClientConfig {
    pub fn write_port(&self) -> u16 {
        self.base_port.wrapping_add(1)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_port: READ_PORT,
            connect_timeout: None,
            keepalive_interval: Duration::from_secs(1),
            startup_delay: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(2),
            configuration_count: CONFIGURATION_COUNT,
            readiness_timeout: None,
            read_chunk_size: READ_CHUNK_SIZE,
            frame: FrameConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use mcl_transport::WRITE_PORT;

    use super::*;

    #[test]
    fn defaults_match_system_ports() {
        let config = ClientConfig::default();
        assert_eq!(config.base_port, READ_PORT);
        assert_eq!(config.write_port(), WRITE_PORT);
        assert_eq!(config.configuration_count, 137);
        assert!(config.readiness_timeout.is_none());
    }
}
