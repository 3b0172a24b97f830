use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::{Node, NodeId, OverlayError};
use crate::ports::{NodeClient, TimeSource};
use crate::transport::{PeerConnection, TransportClient, TransportError};

use super::framing::{read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};
use super::messages::{QueryRequest, QueryResponse};

/// Default bound on cached peer connections.
pub const DEFAULT_MAX_CACHED_CONNECTIONS: usize = 1_000;

type ConnectionCache = Mutex<LruCache<NodeId, PeerConnection>>;

/// [`NodeClient`] over authenticated QUIC.
///
/// Connections are cached per node id and reused across queries. The cache
/// is bounded: the least recently used connection is closed to make room.
/// A connection leaves the cache as soon as it closes (idle timeout, remote
/// close), and a cached connection that fails is dropped so the next query
/// dials again.
pub struct QuicNodeClient {
    transport: TransportClient,
    local: Node,
    time_source: Arc<dyn TimeSource>,
    connections: Arc<ConnectionCache>,
    max_frame_size: usize,
}

impl QuicNodeClient {
    /// `local` is sent as the requester on every query.
    pub fn new(transport: TransportClient, local: Node, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            transport,
            local,
            time_source,
            connections: Arc::new(Mutex::new(LruCache::new(cache_capacity(
                DEFAULT_MAX_CACHED_CONNECTIONS,
            )))),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    #[must_use]
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Bound the connection cache (at least one entry).
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.connections = Arc::new(Mutex::new(LruCache::new(cache_capacity(max))));
        self
    }

    /// Number of cached connections.
    pub fn cached_connections(&self) -> usize {
        self.connections.lock().len()
    }

    async fn connection_to(&self, peer: &Node) -> Result<PeerConnection, TransportError> {
        let cached = self.connections.lock().get(&peer.id).cloned();
        if let Some(conn) = cached {
            if !conn.is_closed() {
                return Ok(conn);
            }
            self.forget(&peer.id);
        }
        let conn = self.transport.dial_node(&peer.address, &peer.id).await?;
        self.remember(&conn);
        Ok(conn)
    }

    /// Cache `conn` and drop it from the cache again once it closes.
    fn remember(&self, conn: &PeerConnection) {
        let peer_id = conn.peer_id();
        let evicted = self.connections.lock().push(peer_id, conn.clone());
        if let Some((evicted_id, evicted)) = evicted {
            if evicted_id != peer_id {
                debug!(peer = %evicted_id.short(), "connection cache full, closing least recently used");
                evicted.close(b"connection cache full");
            }
        }

        let cache: Weak<ConnectionCache> = Arc::downgrade(&self.connections);
        let connection = conn.connection().clone();
        tokio::spawn(async move {
            let reason = connection.closed().await;
            let Some(cache) = cache.upgrade() else {
                return;
            };
            let mut entries = cache.lock();
            let current = entries
                .peek(&peer_id)
                .is_some_and(|c| c.connection().stable_id() == connection.stable_id());
            if current {
                entries.pop(&peer_id);
                debug!(peer = %peer_id.short(), %reason, "closed connection left the cache");
            }
        });
    }

    fn forget(&self, id: &NodeId) {
        self.connections.lock().pop(id);
    }

    async fn exchange(
        &self,
        conn: &PeerConnection,
        target: &NodeId,
        limit: usize,
    ) -> Result<QueryResponse, TransportError> {
        let request = QueryRequest::new(self.local.clone(), *target, limit);
        let (mut send, mut recv) = conn
            .connection()
            .open_bi()
            .await
            .map_err(|e| TransportError::Stream(format!("cannot open stream: {}", e)))?;

        write_frame(&mut send, &request, self.max_frame_size).await?;
        send.finish()
            .map_err(|e| TransportError::Stream(e.to_string()))?;
        read_frame(&mut recv, self.max_frame_size).await
    }

    /// Run one query on `conn`, dropping it from the cache on transport failure.
    async fn query_on(
        &self,
        conn: &PeerConnection,
        address: &str,
        target: &NodeId,
        limit: usize,
    ) -> Result<Vec<Node>, OverlayError> {
        match self.exchange(conn, target, limit).await {
            Ok(QueryResponse::Nodes(mut nodes)) => {
                nodes.truncate(limit);
                let returned = nodes.len();
                nodes.retain(|n| n.validate_address().is_ok());
                if nodes.len() < returned {
                    debug!(
                        peer = %conn.peer_id().short(),
                        dropped = returned - nodes.len(),
                        "discarding reported nodes with invalid addresses"
                    );
                }
                debug!(peer = %conn.peer_id().short(), returned = nodes.len(), "query answered");
                Ok(nodes)
            }
            Ok(QueryResponse::Error { message }) => Err(OverlayError::connectivity(
                address,
                format!("remote error: {}", message),
            )),
            Err(err) => {
                self.forget(&conn.peer_id());
                Err(err.into_overlay(address))
            }
        }
    }
}

#[async_trait]
impl NodeClient for QuicNodeClient {
    async fn query(&self, peer: &Node, target: &NodeId, limit: usize) -> Result<Vec<Node>, OverlayError> {
        let conn = self
            .connection_to(peer)
            .await
            .map_err(|e| e.into_overlay(&peer.address))?;
        self.query_on(&conn, &peer.address, target, limit).await
    }

    async fn query_address(
        &self,
        address: &str,
        target: &NodeId,
        limit: usize,
    ) -> Result<(Node, Vec<Node>), OverlayError> {
        let conn = self
            .transport
            .dial_unauthenticated(address)
            .await
            .map_err(|e| e.into_overlay(address))?;
        self.remember(&conn);

        let nodes = self.query_on(&conn, address, target, limit).await?;
        let responder = Node::new(conn.peer_id(), address, self.time_source.now());
        Ok((responder, nodes))
    }
}

fn cache_capacity(max: usize) -> NonZeroUsize {
    NonZeroUsize::new(max).unwrap_or(NonZeroUsize::MIN)
}
