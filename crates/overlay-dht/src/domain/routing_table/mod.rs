//! Routing Table Implementation
//!
//! This module implements the Kademlia routing table: 256 k-buckets indexed by
//! the length of the prefix a node shares with the local id, each serialized
//! behind its own lock, with least-recently-seen challenge eviction.

mod bucket;
mod config;
mod table;
mod types;

pub use bucket::KBucket;
pub use config::NUM_BUCKETS;
pub use table::RoutingTable;
pub use types::{
    ChallengeOutcome, FailureOutcome, Observation, PendingChallenge, PendingInsertion,
    RoutingTableStats,
};
