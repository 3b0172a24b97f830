//! Test utilities for the overlay.
//!
//! Deterministic time sources and an in-memory synthetic network implementing
//! [`NodeClient`]. Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use overlay_dht::test_utils::FixedTimeSource;
//! use overlay_dht::TimeSource;
//!
//! let time_source = FixedTimeSource::new(1000);
//! assert_eq!(time_source.now().as_secs(), 1000);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::domain::{find_k_closest, Node, NodeId, OverlayError, Timestamp};
use crate::ports::{NodeClient, TimeSource};

/// A time source that returns a fixed timestamp.
#[derive(Debug, Clone)]
pub struct FixedTimeSource {
    timestamp: u64,
}

impl FixedTimeSource {
    /// Create a new fixed time source with the given timestamp (in seconds).
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.timestamp)
    }
}

/// Thread-safe time source that tests can move forward.
#[derive(Debug)]
pub struct ControllableTimeSource {
    time: AtomicU64,
}

impl ControllableTimeSource {
    /// Start the clock at `initial` seconds.
    pub fn new(initial: u64) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    /// Advance the clock by `secs`.
    pub fn advance(&self, secs: u64) {
        self.time.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.time.load(Ordering::SeqCst))
    }
}

/// Deterministic identifier for the `index`-th synthetic member.
pub fn synthetic_id(index: usize) -> NodeId {
    NodeId::from_public_key(format!("synthetic-member-{}", index).as_bytes())
}

/// Address of the `index`-th synthetic member.
pub fn synthetic_address(index: usize) -> String {
    format!("10.{}.{}.{}:7000", index / 65_536 % 256, index / 256 % 256, index % 256)
}

/// Fully connected in-memory network.
///
/// Every member knows every other member and answers a query with the true
/// closest members to the target (excluding itself). Members can be made
/// unreachable, or slow, to exercise failure handling. All queries are logged.
#[derive(Debug, Default)]
pub struct SyntheticNetwork {
    members: RwLock<BTreeMap<NodeId, Node>>,
    unreachable: RwLock<HashSet<NodeId>>,
    delays: RwLock<HashMap<NodeId, Duration>>,
    scripted: RwLock<HashMap<NodeId, Vec<Node>>>,
    queries: Mutex<Vec<(NodeId, NodeId)>>,
}

impl SyntheticNetwork {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Network of `count` members with deterministic ids and addresses.
    pub fn with_members(count: usize) -> Self {
        let network = Self::new();
        for index in 0..count {
            network.add_member(Node::new(
                synthetic_id(index),
                synthetic_address(index),
                Timestamp::new(1),
            ));
        }
        network
    }

    /// Add (or replace) a member.
    pub fn add_member(&self, node: Node) {
        self.members.write().insert(node.id, node);
    }

    /// Snapshot of every member, in id order.
    pub fn members(&self) -> Vec<Node> {
        self.members.read().values().cloned().collect()
    }

    /// Member by id.
    pub fn member(&self, id: &NodeId) -> Option<Node> {
        self.members.read().get(id).cloned()
    }

    /// Make a member (un)reachable.
    pub fn set_unreachable(&self, id: NodeId, unreachable: bool) {
        let mut set = self.unreachable.write();
        if unreachable {
            set.insert(id);
        } else {
            set.remove(&id);
        }
    }

    /// Delay every answer from a member.
    pub fn set_delay(&self, id: NodeId, delay: Duration) {
        self.delays.write().insert(id, delay);
    }

    /// Make a member answer every query with `nodes` instead of the truth.
    pub fn set_answer(&self, id: NodeId, nodes: Vec<Node>) {
        self.scripted.write().insert(id, nodes);
    }

    /// The true `count` closest members to `target`.
    pub fn true_closest(&self, target: &NodeId, count: usize) -> Vec<Node> {
        find_k_closest(&self.members(), target, count)
    }

    /// Total number of queries received by all members.
    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }

    /// Number of queries received by one member.
    pub fn queries_to(&self, id: &NodeId) -> usize {
        self.queries.lock().iter().filter(|(to, _)| to == id).count()
    }

    fn answer(&self, responder: &NodeId, target: &NodeId, limit: usize) -> Vec<Node> {
        let others: Vec<Node> = self
            .members
            .read()
            .values()
            .filter(|n| &n.id != responder)
            .cloned()
            .collect();
        find_k_closest(&others, target, limit)
    }

    async fn serve(&self, id: &NodeId, target: &NodeId, limit: usize) -> Result<Vec<Node>, OverlayError> {
        self.queries.lock().push((*id, *target));

        let delay = self.delays.read().get(id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable.read().contains(id) || !self.members.read().contains_key(id) {
            return Err(OverlayError::connectivity(id.short(), "unreachable"));
        }
        if let Some(mut nodes) = self.scripted.read().get(id).cloned() {
            nodes.truncate(limit);
            return Ok(nodes);
        }
        Ok(self.answer(id, target, limit))
    }
}

#[async_trait]
impl NodeClient for SyntheticNetwork {
    async fn query(
        &self,
        peer: &Node,
        target: &NodeId,
        limit: usize,
    ) -> Result<Vec<Node>, OverlayError> {
        self.serve(&peer.id, target, limit).await
    }

    async fn query_address(
        &self,
        address: &str,
        target: &NodeId,
        limit: usize,
    ) -> Result<(Node, Vec<Node>), OverlayError> {
        let responder = self
            .members
            .read()
            .values()
            .find(|n| n.address == address)
            .cloned()
            .ok_or_else(|| OverlayError::connectivity(address, "no member at address"))?;
        let nodes = self.serve(&responder.id, target, limit).await?;
        Ok((responder, nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_time_source_returns_configured_value() {
        let time = FixedTimeSource::new(12345);
        assert_eq!(time.now().as_secs(), 12345);
    }

    #[test]
    fn test_controllable_time_source_advances() {
        let time = ControllableTimeSource::new(10);
        time.advance(5);
        assert_eq!(time.now().as_secs(), 15);
    }

    #[test]
    fn test_synthetic_ids_are_distinct() {
        let network = SyntheticNetwork::with_members(50);
        assert_eq!(network.members().len(), 50);
        assert_eq!(synthetic_address(1), "10.0.0.1:7000");
    }

    #[tokio::test]
    async fn test_synthetic_member_answers_without_itself() {
        let network = SyntheticNetwork::with_members(10);
        let peer = network.member(&synthetic_id(0)).unwrap();
        let answer = network.query(&peer, &peer.id, 20).await.unwrap();
        assert_eq!(answer.len(), 9);
        assert!(answer.iter().all(|n| n.id != peer.id));
        assert_eq!(network.queries_to(&peer.id), 1);
    }

    #[tokio::test]
    async fn test_unreachable_member_fails() {
        let network = SyntheticNetwork::with_members(3);
        let peer = network.member(&synthetic_id(1)).unwrap();
        network.set_unreachable(peer.id, true);
        assert!(network.ping(&peer).await.is_err());
        network.set_unreachable(peer.id, false);
        assert!(network.ping(&peer).await.is_ok());
    }

    #[tokio::test]
    async fn test_query_address_reports_responder() {
        let network = SyntheticNetwork::with_members(3);
        let (responder, nodes) = network
            .query_address(&synthetic_address(2), &NodeId::MIN, 5)
            .await
            .unwrap();
        assert_eq!(responder.id, synthetic_id(2));
        assert_eq!(nodes.len(), 2);
        assert!(network.query_address("10.9.9.9:1", &NodeId::MIN, 5).await.is_err());
    }
}
