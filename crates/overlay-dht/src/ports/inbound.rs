//! # Driving Ports (Inbound API)
//!
//! The DHT engine as seen by the overlay cache and the runtime.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{Node, NodeId, OverlayError, RoutingTableStats};

/// Result of an iterative lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupOutcome {
    /// Up to K closest nodes found, ascending by distance to the target.
    pub closest: Vec<Node>,
    /// Nodes that answered during the lookup.
    pub contacted: Vec<Node>,
    /// Rounds executed.
    pub rounds: usize,
}

/// Summary of a routing-table join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Seeds that answered.
    pub seeds_reached: usize,
    /// Seeds that failed.
    pub seeds_failed: usize,
    /// Lookups issued (self lookup plus bucket refreshes).
    pub lookups: usize,
    /// Every node seen in any answer, deduplicated, seeds included.
    pub discovered: Vec<Node>,
}

/// Primary API of the Kademlia engine.
///
/// Every network operation takes a cancellation token. Cancelling a lookup
/// aborts its outstanding RPCs and yields the best shortlist gathered so far.
///
/// # Example
///
/// ```rust,ignore
/// use overlay_dht::ports::OverlayDht;
///
/// async fn locate<D: OverlayDht>(dht: &D, target: NodeId) {
///     let cancel = CancellationToken::new();
///     let outcome = dht.lookup(target, &cancel).await?;
///     println!("closest: {}", outcome.closest.len());
/// }
/// ```
#[async_trait]
pub trait OverlayDht: Send + Sync {
    /// The local node's own contact record.
    fn local_node(&self) -> Node;

    /// Up to `count` known nodes closest to `target` (local only, no I/O).
    ///
    /// `count == 0` is malformed input.
    fn find_node(&self, target: &NodeId, count: usize) -> Result<Vec<Node>, OverlayError>;

    /// Up to `limit` known nodes with id ≥ `start`, in ascending id order.
    fn get_nodes(&self, start: &NodeId, limit: usize) -> Vec<Node>;

    /// Iterative network lookup for `target`.
    async fn lookup(
        &self,
        target: NodeId,
        cancel: &CancellationToken,
    ) -> Result<LookupOutcome, OverlayError>;

    /// Single round-trip liveness probe, returning the refreshed record.
    async fn ping(&self, node: &Node, cancel: &CancellationToken) -> Result<Node, OverlayError>;

    /// Ask one peer directly for the nodes it knows closest to `target`.
    async fn query_neighbors(
        &self,
        peer: &Node,
        target: NodeId,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Node>, OverlayError>;

    /// Populate the routing table from seed addresses.
    async fn join(
        &self,
        seeds: &[String],
        cancel: &CancellationToken,
    ) -> Result<JoinReport, OverlayError>;

    /// Routing table statistics.
    fn stats(&self) -> RoutingTableStats;
}
