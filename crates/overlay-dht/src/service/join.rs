use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{Node, NodeId, OverlayError};
use crate::ports::{JoinReport, LookupOutcome, NodeClient};
use crate::service::DhtService;

impl<C: NodeClient> DhtService<C> {
    /// Populate the routing table from seed addresses.
    ///
    /// Seeds are dialled without an expected identity; each answering seed is
    /// inserted under the id from its certificate. Then a lookup for our own
    /// id pulls in the neighbourhood, and one lookup per bucket shallower
    /// than the deepest occupied one fills the far buckets.
    pub(crate) async fn join_network(
        &self,
        seeds: &[String],
        cancel: &CancellationToken,
    ) -> Result<JoinReport, OverlayError> {
        let k = self.config.k;
        let mut report = JoinReport::default();
        let mut discovered: HashMap<NodeId, Node> = HashMap::new();

        for seed in seeds {
            if cancel.is_cancelled() {
                return Err(OverlayError::Cancelled);
            }
            let answer = self
                .with_deadline(seed, cancel, self.client.query_address(seed, &self.local.id, k))
                .await;
            match answer {
                Ok((responder, nodes)) => {
                    if responder.id == self.local.id {
                        warn!(seed = %seed, "seed address answers with our own identity");
                        continue;
                    }
                    report.seeds_reached += 1;
                    let responder = responder.seen_at(self.now());
                    if let Err(err) = self.observe(responder.clone(), cancel).await {
                        debug!(seed = %seed, error = %err, "seed not inserted");
                    }
                    self.collect(&mut discovered, std::iter::once(responder).chain(nodes));
                }
                Err(OverlayError::Cancelled) => return Err(OverlayError::Cancelled),
                Err(err) => {
                    report.seeds_failed += 1;
                    warn!(seed = %seed, error = %err, "seed unreachable");
                }
            }
        }

        if self.table.is_empty() {
            return Err(OverlayError::NoReachablePeers);
        }

        let own_id = self.local.id;
        self.join_lookup(own_id, cancel, &mut report, &mut discovered)
            .await?;

        if let Some(deepest) = self.table.deepest_bucket() {
            for bucket in 0..deepest {
                let target = own_id.random_with_prefix_len(bucket);
                self.join_lookup(target, cancel, &mut report, &mut discovered)
                    .await?;
            }
        }

        report.discovered = discovered.into_values().collect();
        report.discovered.sort_by(|a, b| a.id.cmp(&b.id));
        info!(
            seeds_reached = report.seeds_reached,
            seeds_failed = report.seeds_failed,
            lookups = report.lookups,
            discovered = report.discovered.len(),
            table = self.table.len(),
            "joined overlay"
        );
        Ok(report)
    }

    async fn join_lookup(
        &self,
        target: NodeId,
        cancel: &CancellationToken,
        report: &mut JoinReport,
        discovered: &mut HashMap<NodeId, Node>,
    ) -> Result<(), OverlayError> {
        report.lookups += 1;
        match self.iterative_lookup(target, cancel).await {
            Ok(LookupOutcome {
                closest, contacted, ..
            }) => {
                self.collect(discovered, closest.into_iter().chain(contacted));
                Ok(())
            }
            Err(OverlayError::Cancelled) => Err(OverlayError::Cancelled),
            Err(err) => {
                debug!(target = %target.short(), error = %err, "join lookup found nothing");
                Ok(())
            }
        }
    }

    /// Merge nodes into a dedup map, keeping the most recently seen record.
    pub(crate) fn collect<I: IntoIterator<Item = Node>>(
        &self,
        into: &mut HashMap<NodeId, Node>,
        nodes: I,
    ) {
        for node in nodes {
            if node.id == self.local.id {
                continue;
            }
            match into.get(&node.id) {
                Some(existing) if existing.last_seen >= node.last_seen => {}
                _ => {
                    into.insert(node.id, node);
                }
            }
        }
    }
}
