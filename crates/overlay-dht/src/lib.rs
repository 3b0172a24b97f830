//! # Overlay DHT
//!
//! Peer discovery and membership layer for a decentralized storage network.
//!
//! Every node keeps a Kademlia routing table of other nodes, finds nodes close
//! to any identifier with iterative lookups, persists what it learns into a
//! key-value store, and talks to peers over mutually authenticated QUIC where
//! a node's identity is bound to its certificate key.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** Pure Kademlia logic (XOR distance, k-buckets, routing
//!   table, lookup shortlist)
//! - **Ports Layer:** Trait definitions for the engine API and its
//!   dependencies (peer RPC, key-value store, time, configuration)
//! - **Service Layer:** `DhtService`, the engine wiring domain to ports
//! - **Overlay Layer:** `OverlayCache`, the persistent view of the network
//! - **Adapters Layer:** Stores, time source, configuration loaders
//! - **Transport / Protocol:** QUIC endpoint and `Nodes.Query` RPC
//!   (feature `quic`)
//!
//! ## Example
//!
//! ```rust
//! use overlay_dht::{KademliaConfig, Node, NodeId, Observation, RoutingTable, Timestamp};
//!
//! let local_id = NodeId::new([0u8; 32]);
//! let table = RoutingTable::new(local_id, KademliaConfig::default());
//!
//! let peer = Node::new(NodeId::new([1u8; 32]), "192.168.1.100:7777", Timestamp::new(1000));
//! assert_eq!(table.observe(peer.clone(), Timestamp::new(1000)).unwrap(), Observation::Inserted);
//!
//! let closest = table.find_closest(&peer.id, 1);
//! assert_eq!(closest[0].id, peer.id);
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod overlay;
pub mod ports;
pub mod service;

// =============================================================================
// FEATURE-GATED MODULES
// =============================================================================

/// QUIC endpoint, node identity and authenticated dialing.
/// Requires feature: `quic`
#[cfg(feature = "quic")]
pub mod transport;

/// `Nodes.Query` wire protocol over the QUIC transport.
/// Requires feature: `quic`
#[cfg(feature = "quic")]
pub mod protocol;

/// Test utilities (FixedTimeSource, SyntheticNetwork, etc.)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// =============================================================================
// CORE RE-EXPORTS
// =============================================================================

// Domain entities
pub use domain::{
    Distance, KBucket, KademliaConfig, Node, NodeId, Observation, OverlayConfig, OverlayError,
    RoutingTable, RoutingTableStats, Shortlist, StoreError, Timestamp, MAX_ADDRESS_LEN, NODE_ID_LEN,
};

// Domain services
pub use domain::{
    bucket_index, common_prefix_len, find_k_closest, sort_nodes_by_distance, validate_address,
    xor_distance,
};

// Port traits
pub use ports::{
    ConfigProvider, JoinReport, KeyValueStore, LookupOutcome, NodeClient, OverlayDht, TimeSource,
};

// Service
pub use service::DhtService;

// Overlay cache
pub use overlay::{BootstrapReport, OverlayCache, RefreshReport, RefreshTask};

// =============================================================================
// ADAPTER RE-EXPORTS
// =============================================================================

pub use adapters::{InMemoryKeyValueStore, StaticConfigProvider, SystemTimeSource};

#[cfg(feature = "toml-config")]
pub use adapters::{ConfigError, NodeSettings, TomlConfigProvider};

#[cfg(feature = "rocksdb")]
pub use adapters::RocksDbStore;

#[cfg(feature = "quic")]
pub use protocol::{NodesServer, QuicNodeClient};

#[cfg(feature = "quic")]
pub use transport::{NodeIdentity, OverlayEndpoint, PeerConnection, TransportClient, TransportConfig, TransportError};
