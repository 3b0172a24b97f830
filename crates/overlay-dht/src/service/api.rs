use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{Node, NodeId, OverlayError, RoutingTableStats};
use crate::ports::{JoinReport, LookupOutcome, NodeClient, OverlayDht};
use crate::service::DhtService;

#[async_trait]
impl<C: NodeClient> OverlayDht for DhtService<C> {
    fn local_node(&self) -> Node {
        self.local.clone()
    }

    fn find_node(&self, target: &NodeId, count: usize) -> Result<Vec<Node>, OverlayError> {
        if count == 0 {
            return Err(OverlayError::MalformedInput("count must be positive".into()));
        }
        Ok(self.table.find_closest(target, count))
    }

    fn get_nodes(&self, start: &NodeId, limit: usize) -> Vec<Node> {
        self.table.nodes_from(start, limit)
    }

    async fn lookup(
        &self,
        target: NodeId,
        cancel: &CancellationToken,
    ) -> Result<LookupOutcome, OverlayError> {
        self.iterative_lookup(target, cancel).await
    }

    async fn ping(&self, node: &Node, cancel: &CancellationToken) -> Result<Node, OverlayError> {
        self.ping_node(node, cancel).await
    }

    async fn query_neighbors(
        &self,
        peer: &Node,
        target: NodeId,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Node>, OverlayError> {
        if count == 0 {
            return Err(OverlayError::MalformedInput("count must be positive".into()));
        }
        let answer = self
            .with_deadline(&peer.address, cancel, self.client.query(peer, &target, count))
            .await;
        let now = self.now();
        match answer {
            Ok(nodes) => {
                // The responder proved liveness; the nodes it lists did not.
                self.observe(peer.seen_at(now), cancel).await.ok();
                Ok(nodes)
            }
            Err(OverlayError::Cancelled) => Err(OverlayError::Cancelled),
            Err(err) => {
                self.table.record_failure(&peer.id, now);
                Err(err)
            }
        }
    }

    async fn join(
        &self,
        seeds: &[String],
        cancel: &CancellationToken,
    ) -> Result<JoinReport, OverlayError> {
        self.join_network(seeds, cancel).await
    }

    fn stats(&self) -> RoutingTableStats {
        self.table.stats(self.now())
    }
}
