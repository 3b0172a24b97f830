use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use crate::domain::NodeId;

use super::client::{PeerConnection, TransportClient};
use super::config::TransportConfig;
use super::error::TransportError;
use super::identity::NodeIdentity;
use super::tls;

/// Bound QUIC endpoint serving both incoming connections and outgoing dials.
///
/// Cloning shares the same socket.
#[derive(Clone)]
pub struct OverlayEndpoint {
    endpoint: quinn::Endpoint,
    identity: Arc<NodeIdentity>,
    config: TransportConfig,
}

impl OverlayEndpoint {
    /// Bind `config.bind_addr` with mandatory client certificates.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: TransportConfig, identity: Arc<NodeIdentity>) -> Result<Self, TransportError> {
        let server_config = tls::server_config(&identity, &config)?;
        let client_config = tls::client_config(&identity, &config)?;

        let mut endpoint = quinn::Endpoint::server(server_config, config.bind_addr).map_err(|e| {
            TransportError::Endpoint(format!("cannot bind {}: {}", config.bind_addr, e))
        })?;
        endpoint.set_default_client_config(client_config);

        let this = Self {
            endpoint,
            identity,
            config,
        };
        info!(
            node_id = %this.identity.node_id().short(),
            addr = %this.local_addr()?,
            "overlay endpoint bound"
        );
        Ok(this)
    }

    /// Bound socket address (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.endpoint
            .local_addr()
            .map_err(|e| TransportError::Endpoint(e.to_string()))
    }

    /// Address to advertise to peers: the configured one, or the bound one.
    pub fn advertised_addr(&self) -> Result<String, TransportError> {
        match &self.config.advertised_addr {
            Some(addr) => Ok(addr.clone()),
            None => self.local_addr().map(|a| a.to_string()),
        }
    }

    /// Our node id.
    pub fn node_id(&self) -> NodeId {
        self.identity.node_id()
    }

    /// Transport parameters.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Dialler sharing this endpoint's socket and certificate.
    pub fn client(&self) -> TransportClient {
        TransportClient::new(self.endpoint.clone(), self.config.connect_timeout)
    }

    /// Wait for the next incoming connection and complete its handshake.
    ///
    /// `None` once the endpoint is closed. Handshake failures are returned
    /// per connection; the endpoint keeps accepting.
    pub async fn accept(&self) -> Option<Result<PeerConnection, TransportError>> {
        let incoming = self.endpoint.accept().await?;
        Some(PeerConnection::from_incoming(incoming, self.config.connect_timeout).await)
    }

    /// Next incoming connection attempt, handshake not started.
    pub(crate) async fn accept_incoming(&self) -> Option<quinn::Incoming> {
        self.endpoint.accept().await
    }

    /// Close every connection and stop accepting.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"shutdown");
    }

    /// Wait until all connections are cleanly shut down.
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}

impl std::fmt::Debug for OverlayEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayEndpoint")
            .field("node_id", &self.identity.node_id())
            .field("local_addr", &self.endpoint.local_addr().ok())
            .finish()
    }
}
