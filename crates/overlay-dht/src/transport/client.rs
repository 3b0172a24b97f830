use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::NodeId;

use super::error::TransportError;
use super::identity::node_id_from_certificate;
use super::tls::SERVER_NAME;

/// Established connection together with the identity proven by the remote
/// certificate.
#[derive(Debug, Clone)]
pub struct PeerConnection {
    connection: quinn::Connection,
    peer_id: NodeId,
}

impl PeerConnection {
    fn from_connection(connection: quinn::Connection) -> Result<Self, TransportError> {
        let peer_id = peer_node_id(&connection)?;
        Ok(Self {
            connection,
            peer_id,
        })
    }

    /// Finish the server side of a handshake.
    pub(crate) async fn from_incoming(
        incoming: quinn::Incoming,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let address = incoming.remote_address().to_string();
        let connection = match tokio::time::timeout(timeout, incoming).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                return Err(TransportError::Connect {
                    address,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(TransportError::Timeout {
                    address,
                    after: timeout,
                })
            }
        };
        Self::from_connection(connection)
    }

    /// Id derived from the remote certificate.
    pub fn peer_id(&self) -> NodeId {
        self.peer_id
    }

    /// Remote UDP address.
    pub fn remote_address(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Underlying QUIC connection.
    pub fn connection(&self) -> &quinn::Connection {
        &self.connection
    }

    /// Whether the connection has been closed by either side.
    pub fn is_closed(&self) -> bool {
        self.connection.close_reason().is_some()
    }

    /// Close with an application reason.
    pub fn close(&self, reason: &[u8]) {
        self.connection.close(0u32.into(), reason);
    }
}

/// Outgoing dials over a shared [`quinn::Endpoint`].
#[derive(Clone)]
pub struct TransportClient {
    endpoint: quinn::Endpoint,
    connect_timeout: Duration,
}

impl TransportClient {
    pub(crate) fn new(endpoint: quinn::Endpoint, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
        }
    }

    /// Connect to `address` without an expected identity.
    ///
    /// The remote must still present a valid Ed25519 certificate; the id
    /// derived from it is reported on the returned connection.
    pub async fn dial_unauthenticated(&self, address: &str) -> Result<PeerConnection, TransportError> {
        let remote = resolve(address).await?;
        let connecting = self
            .endpoint
            .connect(remote, SERVER_NAME)
            .map_err(|e| TransportError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let connection = match tokio::time::timeout(self.connect_timeout, connecting).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                return Err(TransportError::Connect {
                    address: address.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(TransportError::Timeout {
                    address: address.to_string(),
                    after: self.connect_timeout,
                })
            }
        };

        let peer = PeerConnection::from_connection(connection)?;
        debug!(addr = %address, peer = %peer.peer_id.short(), "dialled");
        Ok(peer)
    }

    /// Connect to `address` and require the remote to be `expected`.
    pub async fn dial_node(
        &self,
        address: &str,
        expected: &NodeId,
    ) -> Result<PeerConnection, TransportError> {
        let peer = self.dial_unauthenticated(address).await?;
        if peer.peer_id != *expected {
            warn!(
                addr = %address,
                expected = %expected.short(),
                actual = %peer.peer_id.short(),
                "remote presented an unexpected identity"
            );
            peer.close(b"identity mismatch");
            return Err(TransportError::IdentityMismatch {
                expected: *expected,
                actual: peer.peer_id,
            });
        }
        Ok(peer)
    }
}

impl std::fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportClient")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

/// Node id proven by the certificate the remote presented.
fn peer_node_id(connection: &quinn::Connection) -> Result<NodeId, TransportError> {
    let identity = connection
        .peer_identity()
        .ok_or_else(|| TransportError::Certificate("remote presented no certificate".into()))?;
    let certs = identity
        .downcast_ref::<Vec<rustls::pki_types::CertificateDer<'static>>>()
        .ok_or_else(|| TransportError::Certificate("unexpected peer identity type".into()))?;
    let leaf = certs
        .first()
        .ok_or_else(|| TransportError::Certificate("empty certificate chain".into()))?;
    node_id_from_certificate(leaf.as_ref())
}

async fn resolve(address: &str) -> Result<SocketAddr, TransportError> {
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let mut addrs = tokio::net::lookup_host(address)
        .await
        .map_err(|e| TransportError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
    addrs.next().ok_or_else(|| TransportError::InvalidAddress {
        address: address.to_string(),
        reason: "no addresses resolved".into(),
    })
}
