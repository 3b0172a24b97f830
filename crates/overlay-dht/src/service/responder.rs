use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{Node, NodeId, Observation, OverlayError};
use crate::ports::NodeClient;
use crate::service::DhtService;

impl<C: NodeClient> DhtService<C> {
    /// Answer a `Nodes.Query` from `requester`.
    ///
    /// Returns up to `limit` known nodes closest to `target`, never the
    /// requester itself, and offers the requester to the routing table. A
    /// requester whose address is not a bounded `host:port` is rejected
    /// before anything is stored. If
    /// that requires challenging a full bucket, the challenge ping runs in a
    /// spawned task so the answer is not held back by it.
    ///
    /// Must be called from within a tokio runtime. The caller is responsible
    /// for checking that `requester.id` matches the authenticated peer.
    pub fn handle_query(
        &self,
        requester: Node,
        target: NodeId,
        limit: usize,
    ) -> Result<Vec<Node>, OverlayError> {
        if limit == 0 {
            return Err(OverlayError::MalformedInput(
                "query limit must be positive".into(),
            ));
        }
        requester.validate_address()?;
        let limit = limit.min(self.config.max_query_limit);

        let mut nodes = self.table.find_closest(&target, limit + 1);
        nodes.retain(|n| n.id != requester.id);
        nodes.truncate(limit);

        if requester.id == self.local.id {
            return Ok(nodes);
        }

        let requester_id = requester.id;
        match self.table.observe(requester, self.now()) {
            Ok(Observation::Challenge(challenge)) => {
                let service = self.clone();
                tokio::spawn(async move {
                    let cancel = CancellationToken::new();
                    service.settle_challenge(challenge, &cancel).await;
                });
            }
            Ok(observation) => {
                debug!(requester = %requester_id.short(), ?observation, "requester observed")
            }
            Err(err) => debug!(requester = %requester_id.short(), error = %err, "requester rejected"),
        }

        Ok(nodes)
    }
}
