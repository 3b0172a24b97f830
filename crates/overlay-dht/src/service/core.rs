use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{
    ChallengeOutcome, KademliaConfig, Node, Observation, OverlayError, PendingChallenge,
    RoutingTable, Timestamp,
};
use crate::ports::{NodeClient, TimeSource};

/// Kademlia engine over a shared routing table.
///
/// Cheap to clone: all state is behind `Arc`s, so the runtime can hand
/// copies to the protocol server, the overlay cache and background tasks.
///
/// # Example
///
/// ```rust,ignore
/// use overlay_dht::{DhtService, KademliaConfig, Node, NodeId, Timestamp};
///
/// let local = Node::new(identity.node_id(), "203.0.113.7:7777", Timestamp::new(0));
/// let dht = DhtService::new(local, KademliaConfig::default(), client, Arc::new(SystemTimeSource));
/// let outcome = dht.lookup(target, &CancellationToken::new()).await?;
/// ```
pub struct DhtService<C> {
    /// Our own contact record
    pub(crate) local: Node,
    /// Authoritative liveness state for every known node
    pub(crate) table: Arc<RoutingTable>,
    /// Outbound RPC
    pub(crate) client: Arc<C>,
    pub(crate) config: KademliaConfig,
    pub(crate) time_source: Arc<dyn TimeSource>,
}

impl<C> Clone for DhtService<C> {
    fn clone(&self) -> Self {
        Self {
            local: self.local.clone(),
            table: Arc::clone(&self.table),
            client: Arc::clone(&self.client),
            config: self.config.clone(),
            time_source: Arc::clone(&self.time_source),
        }
    }
}

impl<C: NodeClient> DhtService<C> {
    /// Create a service with a fresh, empty routing table.
    pub fn new(
        local: Node,
        config: KademliaConfig,
        client: Arc<C>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let table = Arc::new(RoutingTable::new(local.id, config.clone()));
        Self::with_table(local, table, client, time_source)
    }

    /// Create a service over an existing routing table.
    pub fn with_table(
        local: Node,
        table: Arc<RoutingTable>,
        client: Arc<C>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let config = table.config().clone();
        Self {
            local,
            table,
            client,
            config,
            time_source,
        }
    }

    /// The shared routing table.
    pub fn routing_table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    /// Engine parameters.
    pub fn config(&self) -> &KademliaConfig {
        &self.config
    }

    /// Get the current timestamp from the time source.
    pub(crate) fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    /// Run one RPC under the per-RPC timeout, racing the cancellation token.
    pub(crate) async fn with_deadline<T, F>(
        &self,
        peer: impl Display,
        cancel: &CancellationToken,
        rpc: F,
    ) -> Result<T, OverlayError>
    where
        F: Future<Output = Result<T, OverlayError>>,
    {
        tokio::select! {
            _ = cancel.cancelled() => Err(OverlayError::Cancelled),
            result = tokio::time::timeout(self.config.rpc_timeout(), rpc) => match result {
                Ok(inner) => inner,
                Err(_) => Err(OverlayError::connectivity(peer, "rpc timed out")),
            },
        }
    }

    /// Offer a node we just heard from directly, applying the insertion policy.
    ///
    /// When its bucket is full the least recently seen member is pinged
    /// before this call returns; the member is evicted only if that ping fails.
    pub async fn observe(
        &self,
        node: Node,
        cancel: &CancellationToken,
    ) -> Result<Observation, OverlayError> {
        let observation = self.table.observe(node, self.now())?;
        if let Observation::Challenge(challenge) = &observation {
            self.settle_challenge(challenge.clone(), cancel).await;
        }
        Ok(observation)
    }

    /// Offer several direct contacts, settling up to `alpha` bucket
    /// challenges at a time.
    pub(crate) async fn observe_all(&self, nodes: &[Node], cancel: &CancellationToken) {
        for chunk in nodes.chunks(self.config.alpha.max(1)) {
            let observed = join_all(chunk.iter().map(|node| self.observe(node.clone(), cancel))).await;
            for (node, result) in chunk.iter().zip(observed) {
                if let Err(err) = result {
                    debug!(peer = %node.id.short(), error = %err, "contact not inserted");
                }
            }
        }
    }

    /// Ping the challenged member of a full bucket and apply the result.
    pub(crate) async fn settle_challenge(
        &self,
        challenge: PendingChallenge,
        cancel: &CancellationToken,
    ) -> ChallengeOutcome {
        let challenged = &challenge.challenged;
        let alive = match self
            .with_deadline(&challenged.address, cancel, self.client.ping(challenged))
            .await
        {
            Ok(()) => true,
            Err(OverlayError::Cancelled) => {
                self.table.abandon_challenge(&challenged.id);
                debug!(peer = %challenged.id.short(), "challenge abandoned");
                return ChallengeOutcome::Stale;
            }
            Err(err) => {
                debug!(peer = %challenged.id.short(), error = %err, "challenge ping failed");
                false
            }
        };

        let outcome = self
            .table
            .resolve_challenge(&challenged.id, alive, self.now())
            .unwrap_or(ChallengeOutcome::Stale);
        debug!(
            bucket = challenge.bucket,
            challenged = %challenged.id.short(),
            candidate = %challenge.candidate.id.short(),
            ?outcome,
            "bucket challenge settled"
        );
        outcome
    }
}
