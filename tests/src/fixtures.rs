//! Shared builders for scenarios and benchmarks.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use overlay_dht::test_utils::{FixedTimeSource, SyntheticNetwork};
use overlay_dht::{
    DhtService, InMemoryKeyValueStore, KademliaConfig, Node, NodeId, NodeIdentity, NodesServer,
    OverlayCache, OverlayConfig, OverlayDht, OverlayEndpoint, QuicNodeClient, SystemTimeSource,
    TimeSource, Timestamp, TransportConfig, TransportError,
};

/// Engine over the in-memory network.
pub type SyntheticDht = DhtService<SyntheticNetwork>;

/// Engine over QUIC.
pub type QuicDht = DhtService<QuicNodeClient>;

/// Clock value used by every synthetic fixture.
pub const FIXTURE_TIME: u64 = 1_000;

/// Contact record for a local node outside the synthetic membership.
pub fn local_node(label: &str) -> Node {
    Node::new(
        NodeId::from_public_key(label.as_bytes()),
        "127.0.0.1:7777",
        Timestamp::new(FIXTURE_TIME),
    )
}

/// Engine for `local` over `network` with a fixed clock.
pub fn synthetic_dht(
    local: Node,
    network: Arc<SyntheticNetwork>,
    config: KademliaConfig,
) -> Arc<SyntheticDht> {
    Arc::new(DhtService::new(
        local,
        config,
        network,
        Arc::new(FixedTimeSource::new(FIXTURE_TIME)),
    ))
}

/// Overlay cache with an in-memory store.
pub fn synthetic_cache(
    dht: Arc<SyntheticDht>,
    seeds: Vec<String>,
) -> (OverlayCache<SyntheticDht>, Arc<InMemoryKeyValueStore>) {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let config = OverlayConfig {
        seeds,
        ..OverlayConfig::default()
    };
    (OverlayCache::new(dht, store.clone(), config), store)
}

/// A complete node on loopback: endpoint, responder, engine and cache.
pub struct QuicNode {
    pub dht: Arc<QuicDht>,
    pub client: Arc<QuicNodeClient>,
    pub endpoint: OverlayEndpoint,
    pub cache: Arc<OverlayCache<QuicDht>>,
    pub store: Arc<InMemoryKeyValueStore>,
    pub cancel: CancellationToken,
    server: JoinHandle<()>,
}

impl QuicNode {
    /// Bind with a fresh identity, start the responder and build the cache.
    /// Nothing is dialled.
    pub async fn start(seeds: Vec<String>) -> Result<Self, TransportError> {
        Self::start_with(NodeIdentity::generate()?, seeds).await
    }

    /// Same as [`QuicNode::start`] with a given identity.
    pub async fn start_with(identity: NodeIdentity, seeds: Vec<String>) -> Result<Self, TransportError> {
        let identity = Arc::new(identity);
        let endpoint = OverlayEndpoint::bind(TransportConfig::for_testing(), identity)?;
        let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource::new());
        let local = Node::new(endpoint.node_id(), endpoint.advertised_addr()?, time.now());

        let client = Arc::new(QuicNodeClient::new(endpoint.client(), local.clone(), time.clone()));
        let dht = DhtService::new(local, KademliaConfig::default(), client.clone(), time);
        let cancel = CancellationToken::new();
        let server = NodesServer::new(dht.clone(), endpoint.clone()).spawn(cancel.clone());

        let dht = Arc::new(dht);
        let store = Arc::new(InMemoryKeyValueStore::new());
        let config = OverlayConfig {
            seeds,
            ..OverlayConfig::default()
        };
        let cache = Arc::new(OverlayCache::new(dht.clone(), store.clone(), config));

        Ok(Self {
            dht,
            client,
            endpoint,
            cache,
            store,
            cancel,
            server,
        })
    }

    /// Our contact record.
    pub fn node(&self) -> Node {
        self.dht.local_node()
    }

    /// Address peers dial.
    pub fn address(&self) -> String {
        self.node().address
    }

    /// Whether `id` is in the routing table.
    pub fn knows(&self, id: &NodeId) -> bool {
        self.dht.routing_table().contains(id)
    }

    /// Cancel background work and close the endpoint.
    pub async fn stop(self) {
        self.cancel.cancel();
        self.endpoint.close();
        let _ = self.server.await;
    }
}
