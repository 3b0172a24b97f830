use std::net::SocketAddr;
use std::time::Duration;

/// Transport-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Local UDP address the endpoint binds to.
    pub bind_addr: SocketAddr,
    /// Address other nodes should use to reach us. Defaults to the bound
    /// address when unset.
    pub advertised_addr: Option<String>,
    /// Upper bound on a QUIC handshake.
    pub connect_timeout: Duration,
    /// Idle connections are closed after this long.
    pub idle_timeout: Duration,
    /// Concurrent bidirectional streams a peer may open.
    pub max_streams: u32,
    /// Largest accepted request or response body.
    pub max_frame_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7777)),
            advertised_addr: None,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
            max_streams: 64,
            max_frame_size: 64 * 1024,
        }
    }
}

impl TransportConfig {
    /// Loopback on an ephemeral port with short timeouts.
    pub fn for_testing() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            advertised_addr: None,
            connect_timeout: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(5),
            max_streams: 16,
            max_frame_size: 64 * 1024,
        }
    }

    /// Override the bind address.
    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Override the advertised address.
    #[must_use]
    pub fn with_advertised_addr(mut self, addr: impl Into<String>) -> Self {
        self.advertised_addr = Some(addr.into());
        self
    }
}
