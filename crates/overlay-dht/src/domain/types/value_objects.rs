//! Value Objects for the overlay
//!
//! XOR distance and the tunables of the DHT engine and overlay cache.

use std::fmt;
use std::time::Duration;

use super::entities::NODE_ID_LEN;

/// Full 256-bit XOR distance between two node identifiers.
///
/// Compared as a big-endian unsigned integer: smaller is closer. Two ids that
/// share more leading bits are always closer than two that share fewer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Distance(pub [u8; NODE_ID_LEN]);

impl Distance {
    /// Distance of an id to itself.
    pub const ZERO: Distance = Distance([0u8; NODE_ID_LEN]);

    /// Number of leading zero bits, i.e. the shared prefix length (256 for zero).
    pub fn leading_zeros(&self) -> usize {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return i * 8 + byte.leading_zeros() as usize;
            }
        }
        NODE_ID_LEN * 8
    }

    /// Check whether this is the zero distance.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Distance(lz={}, {})", self.leading_zeros(), hex::encode(&self.0[..4]))
    }
}

/// Tunables for the Kademlia engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KademliaConfig {
    /// Bucket size (default: 20)
    pub k: usize,
    /// Parallelism factor for lookups and liveness sweeps (default: 3)
    pub alpha: usize,
    /// Consecutive failed pings tolerated before a node is removed (default: 3).
    /// Removal happens once the count exceeds this value.
    pub eviction_failure_threshold: u32,
    /// Upper bound on lookup rounds (default: 16)
    pub max_lookup_rounds: usize,
    /// Per-RPC timeout in milliseconds (default: 5000)
    pub rpc_timeout_ms: u64,
    /// Age after which an unresolved bucket challenge is abandoned (default: 10s)
    pub challenge_timeout_secs: u64,
    /// Largest `limit` honoured when answering a query (default: 256)
    pub max_query_limit: usize,
}

impl Default for KademliaConfig {
    fn default() -> Self {
        Self {
            k: 20,
            alpha: 3,
            eviction_failure_threshold: 3,
            max_lookup_rounds: 16,
            rpc_timeout_ms: 5_000,
            challenge_timeout_secs: 10,
            max_query_limit: 256,
        }
    }
}

impl KademliaConfig {
    /// Create a config suitable for testing (smaller values)
    pub fn for_testing() -> Self {
        Self {
            k: 3, // Smaller buckets for easier testing
            alpha: 2,
            eviction_failure_threshold: 3,
            max_lookup_rounds: 8,
            rpc_timeout_ms: 200,
            challenge_timeout_secs: 1,
            max_query_limit: 64,
        }
    }

    /// Per-RPC timeout as a `Duration`.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

/// Tunables for the persistent overlay cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Page limit of the first bootstrap walk page (default: 1280)
    pub bootstrap_seed_limit: usize,
    /// Page limit of every following walk page and of the refresh sample (default: 128)
    pub page_size: usize,
    /// Interval between refresh cycles in seconds (default: 30 minutes)
    pub refresh_interval_secs: u64,
    /// Seed addresses contacted on bootstrap.
    pub seeds: Vec<String>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            bootstrap_seed_limit: 1280,
            page_size: 128,
            refresh_interval_secs: 30 * 60,
            seeds: Vec::new(),
        }
    }
}

impl OverlayConfig {
    /// Interval between refresh cycles as a `Duration`.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
