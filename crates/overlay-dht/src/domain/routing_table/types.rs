//! Routing table result and bookkeeping types.

use crate::domain::{Node, NodeId, Timestamp};

/// A contact waiting to enter a full bucket, pending the challenge result.
///
/// The candidate only gets inserted if the challenged (least recently seen)
/// member fails a fresh ping.
#[derive(Debug, Clone)]
pub struct PendingInsertion {
    /// The new contact waiting to be inserted
    pub candidate: Node,
    /// The existing member being challenged
    pub challenged: NodeId,
    /// When the challenge was issued
    pub challenge_sent_at: Timestamp,
    /// After this instant the challenge is considered abandoned
    pub challenge_deadline: Timestamp,
}

/// A challenge the caller must settle by pinging `challenged`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChallenge {
    /// Bucket the challenge belongs to
    pub bucket: usize,
    /// Least recently seen member, to be pinged
    pub challenged: Node,
    /// Contact that replaces it if the ping fails
    pub candidate: Node,
}

/// What happened when a successful contact was offered to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// New contact stored at the bucket tail.
    Inserted,
    /// Known contact refreshed and moved to the bucket tail.
    Updated,
    /// Bucket is full: the least recently seen member must be pinged first.
    Challenge(PendingChallenge),
    /// Bucket is full and already has a challenge in flight; contact dropped.
    Dropped,
}

/// Result of settling a bucket challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// Challenged member answered; candidate dropped.
    Kept,
    /// Challenged member failed and was replaced by the candidate.
    Replaced {
        /// Member that was evicted (if it was still present)
        evicted: Option<Node>,
    },
    /// No matching challenge was pending (expired or already settled).
    Stale,
}

/// Result of recording a failed contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Node is not in the table.
    Unknown,
    /// Failure recorded; node stays.
    Counted(u32),
    /// Failure count exceeded the threshold; node removed.
    Evicted(Node),
}

/// Statistics about the routing table state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTableStats {
    /// Total number of nodes in buckets
    pub total_nodes: usize,
    /// Number of buckets with at least one node
    pub buckets_used: usize,
    /// Buckets with an unresolved challenge
    pub pending_challenges: usize,
    /// Age of the least recently seen node in seconds
    pub oldest_node_age_seconds: u64,
}
