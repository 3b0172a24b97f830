use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::{FailureOutcome, Node, OverlayError};
use crate::ports::NodeClient;
use crate::service::DhtService;

impl<C: NodeClient> DhtService<C> {
    /// Single round-trip probe.
    ///
    /// Success refreshes the node (last seen, failure count reset, moved to
    /// the tail of its bucket) or offers it to the table if it was unknown.
    /// Failure bumps the failure count and removes the node once the count
    /// exceeds the eviction threshold. The probe error is always returned.
    pub(crate) async fn ping_node(
        &self,
        node: &Node,
        cancel: &CancellationToken,
    ) -> Result<Node, OverlayError> {
        let result = self
            .with_deadline(&node.address, cancel, self.client.ping(node))
            .await;
        let now = self.now();

        match result {
            Ok(()) => {
                if let Some(refreshed) = self.table.record_success(&node.id, now) {
                    return Ok(refreshed);
                }
                let fresh = node.seen_at(now);
                if let Err(err) = self.observe(fresh.clone(), cancel).await {
                    debug!(peer = %node.id.short(), error = %err, "pinged node not inserted");
                }
                Ok(self.table.get(&node.id).unwrap_or(fresh))
            }
            Err(OverlayError::Cancelled) => Err(OverlayError::Cancelled),
            Err(err) => {
                match self.table.record_failure(&node.id, now) {
                    FailureOutcome::Evicted(evicted) => info!(
                        peer = %evicted.id.short(),
                        failures = evicted.failure_count,
                        "node evicted after repeated ping failures"
                    ),
                    FailureOutcome::Counted(failures) => {
                        debug!(peer = %node.id.short(), failures, error = %err, "ping failed")
                    }
                    FailureOutcome::Unknown => {}
                }
                Err(err)
            }
        }
    }
}
