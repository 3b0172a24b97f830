//! # Driven Ports (Outbound SPI)
//!
//! These are the interfaces the overlay **requires** the host application to
//! implement.

use async_trait::async_trait;

use crate::domain::{KademliaConfig, Node, NodeId, OverlayConfig, OverlayError, StoreError, Timestamp};

/// Remote side of the `Nodes.Query` RPC.
///
/// Production: `QuicNodeClient` (authenticated QUIC dial + framed request).
/// Testing: `SyntheticNetwork` (in-memory, with injectable failures).
///
/// Implementations do not need to enforce timeouts; the DHT engine wraps
/// every call in its own per-RPC deadline.
#[async_trait]
pub trait NodeClient: Send + Sync + 'static {
    /// Ask `peer` for up to `limit` nodes it knows closest to `target`.
    ///
    /// The connection must be authenticated against `peer.id`.
    async fn query(&self, peer: &Node, target: &NodeId, limit: usize)
        -> Result<Vec<Node>, OverlayError>;

    /// Same query against an address whose identity is not known yet.
    ///
    /// Returns the responder (id taken from its certificate, address as
    /// dialled) together with its answer.
    async fn query_address(
        &self,
        address: &str,
        target: &NodeId,
        limit: usize,
    ) -> Result<(Node, Vec<Node>), OverlayError>;

    /// Liveness probe: a lookup for the peer's own id is a valid round trip.
    async fn ping(&self, peer: &Node) -> Result<(), OverlayError> {
        self.query(peer, &peer.id, 1).await.map(|_| ())
    }
}

/// Abstract interface for key-value database operations.
///
/// Production: `RocksDbStore` (feature `rocksdb`)
/// Testing: `InMemoryKeyValueStore`
///
/// Methods take `&self`: backends must be safe for concurrent use and the
/// overlay cache adds no locking of its own.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key. `Ok(None)` when the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert or overwrite a value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Delete a key (absent keys are not an error).
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}

/// Abstract interface for time-related operations.
///
/// Production implementations use system time; tests use fixed timestamps.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Abstract interface for configuration loading.
pub trait ConfigProvider: Send + Sync {
    /// Seed addresses contacted on bootstrap.
    fn bootstrap_nodes(&self) -> Vec<String>;

    /// Kademlia engine parameters.
    fn kademlia_config(&self) -> KademliaConfig;

    /// Overlay cache parameters (seeds included).
    fn overlay_config(&self) -> OverlayConfig;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTimeSource(u64);

    impl TimeSource for FixedTimeSource {
        fn now(&self) -> Timestamp {
            Timestamp::new(self.0)
        }
    }

    struct EchoClient;

    #[async_trait]
    impl NodeClient for EchoClient {
        async fn query(
            &self,
            peer: &Node,
            _target: &NodeId,
            _limit: usize,
        ) -> Result<Vec<Node>, OverlayError> {
            Ok(vec![peer.clone()])
        }

        async fn query_address(
            &self,
            address: &str,
            _target: &NodeId,
            _limit: usize,
        ) -> Result<(Node, Vec<Node>), OverlayError> {
            Err(OverlayError::connectivity(address, "unsupported"))
        }
    }

    #[test]
    fn test_fixed_time_source_returns_configured_value() {
        let source = FixedTimeSource(1000);
        assert_eq!(source.now().as_secs(), 1000);
    }

    #[tokio::test]
    async fn test_default_ping_is_a_self_lookup() {
        let peer = Node::new(NodeId::random(), "127.0.0.1:1", Timestamp::new(1));
        assert!(EchoClient.ping(&peer).await.is_ok());
    }
}
