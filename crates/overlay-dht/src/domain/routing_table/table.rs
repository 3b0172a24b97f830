//! Main RoutingTable implementation.

use parking_lot::Mutex;

use crate::domain::{
    bucket_index, sort_nodes_by_distance, KademliaConfig, Node, NodeId, OverlayError, Timestamp,
};

use super::bucket::KBucket;
use super::config::NUM_BUCKETS;
use super::types::{
    ChallengeOutcome, FailureOutcome, Observation, PendingChallenge, PendingInsertion,
    RoutingTableStats,
};

/// The Kademlia routing table.
///
/// Every bucket sits behind its own lock, so mutations of one bucket are
/// serialized while lookups and incoming queries touching other buckets
/// proceed in parallel. All methods take `&self`; the table is shared through
/// an `Arc` and the bucket array is never handed out.
#[derive(Debug)]
pub struct RoutingTable {
    /// Our own node ID (immutable after creation)
    local_id: NodeId,
    /// 256 k-buckets, indexed by shared prefix length with `local_id`
    buckets: Vec<Mutex<KBucket>>,
    config: KademliaConfig,
}

impl RoutingTable {
    /// Create a new, empty routing table
    pub fn new(local_id: NodeId, config: KademliaConfig) -> Self {
        let buckets = (0..NUM_BUCKETS).map(|_| Mutex::new(KBucket::new())).collect();
        Self {
            local_id,
            buckets,
            config,
        }
    }

    /// Get our local node ID
    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    /// Get the configuration
    pub fn config(&self) -> &KademliaConfig {
        &self.config
    }

    fn bucket_for(&self, id: &NodeId) -> Result<&Mutex<KBucket>, OverlayError> {
        let idx = bucket_index(&self.local_id, id).ok_or(OverlayError::SelfConnection)?;
        self.buckets
            .get(idx)
            .ok_or_else(|| OverlayError::MalformedInput(format!("bucket {} out of range", idx)))
    }

    // =========================================================================
    // Insertion policy
    // =========================================================================

    /// Offer a node we just heard from directly.
    ///
    /// Known nodes are refreshed and moved to the tail. Unknown nodes are
    /// appended while the bucket has room. A full bucket returns a
    /// [`Observation::Challenge`]: the caller pings the challenged member and
    /// reports back through [`RoutingTable::resolve_challenge`].
    pub fn observe(&self, node: Node, now: Timestamp) -> Result<Observation, OverlayError> {
        let idx = bucket_index(&self.local_id, &node.id).ok_or(OverlayError::SelfConnection)?;
        let mut bucket = self.buckets[idx].lock();

        if bucket.refresh(&node.id, Some(&node.address), now).is_some() {
            return Ok(Observation::Updated);
        }

        if !bucket.is_full(self.config.k) {
            bucket.push(node.seen_at(now), now);
            return Ok(Observation::Inserted);
        }

        bucket.expire_challenge(now);
        if bucket.has_pending_challenge() {
            return Ok(Observation::Dropped);
        }

        let Some(challenged) = bucket.least_recently_seen().cloned() else {
            return Ok(Observation::Dropped);
        };
        let candidate = node.seen_at(now);
        bucket.pending_insertion = Some(PendingInsertion {
            candidate: candidate.clone(),
            challenged: challenged.id,
            challenge_sent_at: now,
            challenge_deadline: now.add_secs(self.config.challenge_timeout_secs),
        });

        Ok(Observation::Challenge(PendingChallenge {
            bucket: idx,
            challenged,
            candidate,
        }))
    }

    /// Settle a challenge with the outcome of the ping against `challenged`.
    pub fn resolve_challenge(
        &self,
        challenged: &NodeId,
        is_alive: bool,
        now: Timestamp,
    ) -> Result<ChallengeOutcome, OverlayError> {
        let mut bucket = self.bucket_for(challenged)?.lock();

        let matches = bucket
            .pending_insertion
            .as_ref()
            .is_some_and(|p| &p.challenged == challenged);
        if !matches {
            return Ok(ChallengeOutcome::Stale);
        }
        let Some(pending) = bucket.pending_insertion.take() else {
            return Ok(ChallengeOutcome::Stale);
        };

        if is_alive {
            bucket.refresh(challenged, None, now);
            return Ok(ChallengeOutcome::Kept);
        }

        let evicted = bucket.remove(challenged);
        if !bucket.contains(&pending.candidate.id) && !bucket.is_full(self.config.k) {
            bucket.push(pending.candidate, now);
        }
        Ok(ChallengeOutcome::Replaced { evicted })
    }

    /// Drop the pending challenge against `challenged` without a verdict.
    ///
    /// Both nodes stay as they are; the bucket accepts a new challenge at once.
    pub fn abandon_challenge(&self, challenged: &NodeId) -> bool {
        let Ok(bucket) = self.bucket_for(challenged) else {
            return false;
        };
        let mut bucket = bucket.lock();
        let matches = bucket
            .pending_insertion
            .as_ref()
            .is_some_and(|p| &p.challenged == challenged);
        if matches {
            bucket.pending_insertion = None;
        }
        matches
    }

    // =========================================================================
    // Liveness bookkeeping
    // =========================================================================

    /// Record a successful contact with a known node.
    ///
    /// Returns the refreshed record, or `None` if the node is not in the table.
    pub fn record_success(&self, id: &NodeId, now: Timestamp) -> Option<Node> {
        let bucket = self.bucket_for(id).ok()?;
        let mut bucket = bucket.lock();
        bucket.refresh(id, None, now)
    }

    /// Record a failed contact.
    ///
    /// Once the failure count exceeds the eviction threshold the node is
    /// removed. If the removed node was the target of a pending challenge,
    /// the waiting candidate takes its slot.
    pub fn record_failure(&self, id: &NodeId, now: Timestamp) -> FailureOutcome {
        let Ok(bucket) = self.bucket_for(id) else {
            return FailureOutcome::Unknown;
        };
        let mut bucket = bucket.lock();

        let Some(count) = bucket.record_failure(id) else {
            return FailureOutcome::Unknown;
        };
        if count <= self.config.eviction_failure_threshold {
            return FailureOutcome::Counted(count);
        }

        let Some(evicted) = bucket.remove(id) else {
            return FailureOutcome::Unknown;
        };
        let promote = bucket
            .pending_insertion
            .as_ref()
            .is_some_and(|p| &p.challenged == id);
        if promote {
            if let Some(pending) = bucket.pending_insertion.take() {
                if !bucket.contains(&pending.candidate.id) {
                    bucket.push(pending.candidate, now);
                }
            }
        }
        FailureOutcome::Evicted(evicted)
    }

    /// Remove a node from the routing table
    pub fn remove(&self, id: &NodeId) -> Option<Node> {
        let bucket = self.bucket_for(id).ok()?;
        let mut bucket = bucket.lock();
        bucket.remove(id)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Snapshot of a single node
    pub fn get(&self, id: &NodeId) -> Option<Node> {
        let bucket = self.bucket_for(id).ok()?;
        let bucket = bucket.lock();
        bucket.get(id).cloned()
    }

    /// Check whether a node is known
    pub fn contains(&self, id: &NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Total node count across all buckets
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.lock().len()).sum()
    }

    /// Check whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.lock().is_empty())
    }

    /// Number of nodes in bucket `index` (0 for an out-of-range index)
    pub fn bucket_len(&self, index: usize) -> usize {
        self.buckets.get(index).map_or(0, |b| b.lock().len())
    }

    /// Snapshot of bucket `index`, least recently seen first
    pub fn bucket_nodes(&self, index: usize) -> Vec<Node> {
        self.buckets
            .get(index)
            .map(|b| b.lock().nodes().to_vec())
            .unwrap_or_default()
    }

    /// Index of the deepest (longest shared prefix) non-empty bucket
    pub fn deepest_bucket(&self) -> Option<usize> {
        (0..NUM_BUCKETS).rev().find(|i| !self.buckets[*i].lock().is_empty())
    }

    /// Snapshot of every known node
    pub fn all_nodes(&self) -> Vec<Node> {
        self.buckets
            .iter()
            .flat_map(|b| b.lock().nodes().to_vec())
            .collect()
    }

    /// Up to `count` known nodes closest to `target`, ascending by distance.
    ///
    /// Buckets are read in tiers of strictly increasing distance to `target`:
    /// the bucket sharing `target`'s prefix with the local id, then every
    /// deeper bucket together, then each shallower bucket in turn. Reading
    /// stops after the first tier that brings the total to `count`.
    pub fn find_closest(&self, target: &NodeId, count: usize) -> Vec<Node> {
        if count == 0 {
            return Vec::new();
        }

        let mut tiers: Vec<Vec<usize>> = Vec::new();
        match bucket_index(&self.local_id, target) {
            Some(i) => {
                tiers.push(vec![i]);
                tiers.push((i + 1..NUM_BUCKETS).collect());
                tiers.extend((0..i).rev().map(|j| vec![j]));
            }
            None => tiers.extend((0..NUM_BUCKETS).rev().map(|j| vec![j])),
        }

        let mut found = Vec::new();
        for tier in tiers {
            for idx in tier {
                found.extend_from_slice(self.buckets[idx].lock().nodes());
            }
            if found.len() >= count {
                break;
            }
        }

        sort_nodes_by_distance(&mut found, target);
        found.truncate(count);
        found
    }

    /// Up to `limit` known nodes with `id >= start`, in ascending id order.
    pub fn nodes_from(&self, start: &NodeId, limit: usize) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .all_nodes()
            .into_iter()
            .filter(|n| n.id >= *start)
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes.truncate(limit);
        nodes
    }

    /// Get routing table statistics
    pub fn stats(&self, now: Timestamp) -> RoutingTableStats {
        let mut stats = RoutingTableStats::default();
        for bucket in &self.buckets {
            let bucket = bucket.lock();
            if bucket.is_empty() {
                continue;
            }
            stats.total_nodes += bucket.len();
            stats.buckets_used += 1;
            if bucket.has_pending_challenge() {
                stats.pending_challenges += 1;
            }
            if let Some(oldest) = bucket.least_recently_seen() {
                stats.oldest_node_age_seconds =
                    stats.oldest_node_age_seconds.max(oldest.last_seen.age_at(now));
            }
        }
        stats
    }
}
