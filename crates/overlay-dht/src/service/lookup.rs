use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{Node, NodeId, OverlayError, Shortlist, Timestamp};
use crate::ports::{LookupOutcome, NodeClient};
use crate::service::DhtService;

impl<C: NodeClient> DhtService<C> {
    /// Iterative lookup over an explicit shortlist.
    ///
    /// Each round queries up to `alpha` pending candidates among the `k`
    /// closest live ones, concurrently, and merges every answer. The loop
    /// ends when the `k` closest have all been asked, when a round yields
    /// nothing to ask, after `max_lookup_rounds`, or on cancellation.
    pub(crate) async fn iterative_lookup(
        &self,
        target: NodeId,
        cancel: &CancellationToken,
    ) -> Result<LookupOutcome, OverlayError> {
        let k = self.config.k;
        let mut shortlist = Shortlist::new(target, self.local.id, k);
        shortlist.seed(self.table.find_closest(&target, k));

        let mut contacted = Vec::new();
        let mut rounds = 0;

        while rounds < self.config.max_lookup_rounds && !cancel.is_cancelled() {
            let batch = shortlist.next_round(self.config.alpha);
            if batch.is_empty() {
                break;
            }
            rounds += 1;

            let queries = batch.iter().map(|peer| async move {
                let answer = self
                    .with_deadline(&peer.address, cancel, self.client.query(peer, &target, k))
                    .await;
                (peer, answer)
            });

            let answers = tokio::select! {
                _ = cancel.cancelled() => {
                    shortlist.reset_in_flight();
                    break;
                }
                answers = join_all(queries) => answers,
            };

            let now = self.now();
            for (peer, answer) in answers {
                match answer {
                    Ok(nodes) => {
                        shortlist.mark_queried(&peer.id);
                        shortlist.merge(nodes.into_iter().map(|n| cap_last_seen(n, now)));
                        contacted.push(peer.seen_at(now));
                    }
                    Err(OverlayError::Cancelled) => {}
                    Err(err) => {
                        debug!(peer = %peer.id.short(), error = %err, "lookup query failed");
                        shortlist.mark_failed(&peer.id);
                        self.table.record_failure(&peer.id, now);
                    }
                }
            }
            shortlist.reset_in_flight();

            if shortlist.is_converged() {
                break;
            }
        }

        self.observe_all(&contacted, cancel).await;

        let closest = shortlist.closest();
        debug!(
            target = %target.short(),
            rounds,
            found = closest.len(),
            contacted = contacted.len(),
            "lookup finished"
        );

        if closest.is_empty() {
            return Err(if cancel.is_cancelled() {
                OverlayError::Cancelled
            } else {
                OverlayError::NoReachablePeers
            });
        }

        Ok(LookupOutcome {
            closest,
            contacted,
            rounds,
        })
    }
}

/// A peer cannot report a contact as seen later than our own clock.
fn cap_last_seen(mut node: Node, now: Timestamp) -> Node {
    node.last_seen = node.last_seen.min(now);
    node
}
