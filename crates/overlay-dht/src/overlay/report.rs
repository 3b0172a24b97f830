//! Cycle summaries returned by the overlay cache.

/// Outcome of one bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Seeds that answered.
    pub seeds_reached: usize,
    /// Seeds that failed.
    pub seeds_failed: usize,
    /// Whether the routing-table join failed as a whole.
    pub join_failed: bool,
    /// Routing-table nodes visited by the walk.
    pub walked: usize,
    /// Walked nodes that answered the neighbour query.
    pub contacted: usize,
    /// Walked nodes that did not.
    pub failed: usize,
    /// Distinct records written to the store.
    pub persisted: usize,
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Nodes in the random sample.
    pub sampled: usize,
    /// Nodes visited by the full sweep (sampled nodes are not pinged twice).
    pub swept: usize,
    /// Pings that succeeded.
    pub refreshed: usize,
    /// Pings that failed.
    pub failed: usize,
    /// Records written to the store.
    pub persisted: usize,
    /// Cycle stopped early on cancellation.
    pub cancelled: bool,
}

impl RefreshReport {
    /// Total pings issued.
    pub fn pinged(&self) -> usize {
        self.refreshed + self.failed
    }
}
