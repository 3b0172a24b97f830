//! K-Bucket implementation for Kademlia routing.

use super::types::PendingInsertion;
use crate::domain::{Node, NodeId, Timestamp};

/// A k-bucket storing up to k nodes sharing one prefix length with the local id.
///
/// Nodes are ordered by recency of contact: least recently seen first, most
/// recently seen last. A full bucket does not evict on a new contact; it
/// challenges its head with a ping and only evicts when that ping fails.
#[derive(Debug, Clone)]
pub struct KBucket {
    /// Nodes in this bucket (max size = K)
    pub(crate) nodes: Vec<Node>,
    /// Last time this bucket was updated
    pub(crate) last_updated: Timestamp,
    /// Contact waiting to join this bucket, pending challenge result.
    pub(crate) pending_insertion: Option<PendingInsertion>,
}

impl KBucket {
    /// Create a new empty k-bucket
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            last_updated: Timestamp::new(0),
            pending_insertion: None,
        }
    }

    /// Get the number of nodes in this bucket
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the bucket is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if the bucket is full
    pub fn is_full(&self, k: usize) -> bool {
        self.nodes.len() >= k
    }

    /// Least recently seen node
    pub fn least_recently_seen(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// All nodes, least recently seen first
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Time of the last mutation
    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }

    /// Check if a challenge is in flight
    pub fn has_pending_challenge(&self) -> bool {
        self.pending_insertion.is_some()
    }

    /// Check if bucket contains a node
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|n| &n.id == id)
    }

    /// Look up a node by id
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Append a node at the recency tail (assumes not full and not present)
    pub(crate) fn push(&mut self, node: Node, now: Timestamp) {
        self.nodes.push(node);
        self.last_updated = now;
    }

    /// Remove a node by id
    pub(crate) fn remove(&mut self, id: &NodeId) -> Option<Node> {
        self.nodes
            .iter()
            .position(|n| &n.id == id)
            .map(|pos| self.nodes.remove(pos))
    }

    /// Mark a node as just seen and move it to the tail.
    ///
    /// A non-empty `address` replaces the stored one.
    pub(crate) fn refresh(&mut self, id: &NodeId, address: Option<&str>, now: Timestamp) -> Option<Node> {
        let pos = self.nodes.iter().position(|n| &n.id == id)?;
        let mut node = self.nodes.remove(pos);
        node.last_seen = now;
        node.failure_count = 0;
        if let Some(addr) = address.filter(|a| !a.is_empty()) {
            node.address = addr.to_string();
        }
        self.nodes.push(node.clone());
        self.last_updated = now;
        Some(node)
    }

    /// Increment the failure count of a node, returning the new count.
    pub(crate) fn record_failure(&mut self, id: &NodeId) -> Option<u32> {
        let node = self.nodes.iter_mut().find(|n| &n.id == id)?;
        node.failure_count = node.failure_count.saturating_add(1);
        Some(node.failure_count)
    }

    /// Drop a pending challenge whose deadline has passed.
    pub(crate) fn expire_challenge(&mut self, now: Timestamp) {
        if self
            .pending_insertion
            .as_ref()
            .is_some_and(|p| now >= p.challenge_deadline)
        {
            self.pending_insertion = None;
        }
    }
}

impl Default for KBucket {
    fn default() -> Self {
        Self::new()
    }
}
