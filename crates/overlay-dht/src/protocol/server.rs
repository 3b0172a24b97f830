use std::net::SocketAddr;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::NodeId;
use crate::ports::NodeClient;
use crate::service::DhtService;
use crate::transport::{OverlayEndpoint, PeerConnection, TransportError};

use super::framing::{read_frame, write_frame};
use super::messages::{QueryRequest, QueryResponse};

/// How long a peer has to deliver its request once a stream is open.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Responder side of `Nodes.Query`.
///
/// Accepts connections on an [`OverlayEndpoint`], serves every stream as
/// one query and hands requests to [`DhtService::handle_query`].
pub struct NodesServer<C> {
    dht: DhtService<C>,
    endpoint: OverlayEndpoint,
    max_frame_size: usize,
    read_timeout: Duration,
}

impl<C: NodeClient> NodesServer<C> {
    pub fn new(dht: DhtService<C>, endpoint: OverlayEndpoint) -> Self {
        let max_frame_size = endpoint.config().max_frame_size;
        Self {
            dht,
            endpoint,
            max_frame_size,
            read_timeout: REQUEST_READ_TIMEOUT,
        }
    }

    /// Override how long a request may take to arrive.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Run the accept loop in a background task.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Accept connections until `cancel` fires or the endpoint closes.
    pub async fn run(self, cancel: CancellationToken) {
        let handshake_timeout = self.endpoint.config().connect_timeout;
        let mut accepted: u64 = 0;

        loop {
            let incoming = tokio::select! {
                _ = cancel.cancelled() => break,
                incoming = self.endpoint.accept_incoming() => match incoming {
                    Some(incoming) => incoming,
                    None => break,
                },
            };
            accepted += 1;

            let dht = self.dht.clone();
            let cancel = cancel.clone();
            let max_frame_size = self.max_frame_size;
            let read_timeout = self.read_timeout;
            tokio::spawn(async move {
                let peer = match PeerConnection::from_incoming(incoming, handshake_timeout).await {
                    Ok(peer) => peer,
                    Err(err) => {
                        debug!(error = %err, "incoming handshake failed");
                        return;
                    }
                };
                serve_connection(dht, peer, max_frame_size, read_timeout, cancel).await;
            });
        }

        info!(connections = accepted, "nodes server stopped");
    }
}

async fn serve_connection<C: NodeClient>(
    dht: DhtService<C>,
    peer: PeerConnection,
    max_frame_size: usize,
    read_timeout: Duration,
    cancel: CancellationToken,
) {
    let peer_id = peer.peer_id();
    let remote = peer.remote_address();
    debug!(peer = %peer_id.short(), addr = %remote, "connection accepted");

    loop {
        let stream = tokio::select! {
            _ = cancel.cancelled() => break,
            stream = peer.connection().accept_bi() => stream,
        };
        let (send, recv) = match stream {
            Ok(stream) => stream,
            Err(err) => {
                debug!(peer = %peer_id.short(), reason = %err, "connection closed");
                break;
            }
        };

        let dht = dht.clone();
        tokio::spawn(async move {
            if let Err(err) =
                serve_stream(&dht, peer_id, remote, send, recv, max_frame_size, read_timeout).await
            {
                debug!(peer = %peer_id.short(), error = %err, "stream error");
            }
        });
    }
}

async fn serve_stream<C: NodeClient>(
    dht: &DhtService<C>,
    peer_id: NodeId,
    remote: SocketAddr,
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    max_frame_size: usize,
    read_timeout: Duration,
) -> Result<(), TransportError> {
    let request = tokio::time::timeout(
        read_timeout,
        read_frame::<_, QueryRequest>(&mut recv, max_frame_size),
    )
    .await
    .map_err(|_| TransportError::Stream("request read timed out".into()))?;

    let response = match request {
        Ok(request) => answer(dht, peer_id, remote, request),
        Err(TransportError::FrameTooLarge { size, max }) => {
            warn!(peer = %peer_id.short(), size, max, "rejecting oversized request");
            QueryResponse::error(format!("request too large: {} bytes (max {})", size, max))
        }
        Err(err) => return Err(err),
    };

    write_frame(&mut send, &response, max_frame_size).await?;
    send.finish()
        .map_err(|e| TransportError::Stream(e.to_string()))?;
    Ok(())
}

fn answer<C: NodeClient>(
    dht: &DhtService<C>,
    peer_id: NodeId,
    remote: SocketAddr,
    request: QueryRequest,
) -> QueryResponse {
    let QueryRequest {
        mut requester,
        target,
        limit,
    } = request;

    if requester.id != peer_id {
        warn!(
            addr = %remote,
            claimed = %requester.id.short(),
            verified = %peer_id.short(),
            "rejecting request: requester does not match connection identity"
        );
        return QueryResponse::error("requester does not match connection identity");
    }
    if requester.address.is_empty() {
        requester.address = remote.to_string();
    }

    match dht.handle_query(requester, target, limit as usize) {
        Ok(nodes) => {
            debug!(peer = %peer_id.short(), target = %target.short(), returned = nodes.len(), "query answered");
            QueryResponse::Nodes(nodes)
        }
        Err(err) => QueryResponse::error(err.to_string()),
    }
}
