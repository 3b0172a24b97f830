use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{Node, NodeId, OverlayConfig, OverlayError, NODE_ID_LEN};
use crate::ports::{KeyValueStore, OverlayDht};

use super::report::{BootstrapReport, RefreshReport};

/// Probes in flight at once during refresh and bootstrap walks.
const DEFAULT_CONCURRENCY: usize = 3;

/// Persistent cache of overlay membership.
///
/// Records are bincode-encoded [`Node`]s keyed by the raw 32-byte node id.
/// The store is injected, so any [`KeyValueStore`] backend works; the cache
/// itself holds no lock.
pub struct OverlayCache<D> {
    dht: Arc<D>,
    store: Arc<dyn KeyValueStore>,
    config: OverlayConfig,
    concurrency: usize,
}

impl<D: OverlayDht> OverlayCache<D> {
    /// Create a cache over `dht`, persisting into `store`.
    pub fn new(dht: Arc<D>, store: Arc<dyn KeyValueStore>, config: OverlayConfig) -> Self {
        Self {
            dht,
            store,
            config,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Bound the number of concurrent probes (normally Kademlia's alpha).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The DHT engine the cache reads from.
    pub fn dht(&self) -> &Arc<D> {
        &self.dht
    }

    /// Cache parameters.
    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Look up a persisted record. A miss is `Ok(None)`.
    pub fn get(&self, id: &NodeId) -> Result<Option<Node>, OverlayError> {
        let Some(bytes) = self.store.get(id.as_bytes())? else {
            return Ok(None);
        };
        decode_record(&bytes).map(Some)
    }

    /// Insert or overwrite the record stored under `id`.
    pub fn put(&self, id: &NodeId, node: &Node) -> Result<(), OverlayError> {
        let bytes = bincode::serialize(node).map_err(|e| {
            OverlayError::MalformedInput(format!("cannot encode node {}: {}", id.short(), e))
        })?;
        self.store.put(id.as_bytes(), &bytes)?;
        Ok(())
    }

    /// Every persisted record, in id order.
    ///
    /// Keys that are not node ids and values that do not decode are skipped.
    pub fn walk(&self) -> Result<Vec<Node>, OverlayError> {
        let entries = self.store.prefix_scan(&[])?;
        let mut nodes = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            if key.len() != NODE_ID_LEN {
                continue;
            }
            match decode_record(&value) {
                Ok(node) => nodes.push(node),
                Err(err) => warn!(key = %hex::encode(&key), error = %err, "skipping undecodable record"),
            }
        }
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    /// Ping every persisted node so the ones still alive re-enter the
    /// routing table. Returns how many answered.
    pub async fn warm_start(&self, cancel: &CancellationToken) -> Result<usize, OverlayError> {
        let local_id = self.dht.local_node().id;
        let records: Vec<Node> = self
            .walk()?
            .into_iter()
            .filter(|n| n.id != local_id)
            .collect();

        let mut revived = 0;
        for chunk in records.chunks(self.concurrency) {
            if cancel.is_cancelled() {
                break;
            }
            let results = join_all(chunk.iter().map(|node| self.dht.ping(node, cancel))).await;
            revived += results.iter().filter(|r| r.is_ok()).count();
        }

        info!(records = records.len(), revived, "warm start finished");
        Ok(revived)
    }

    // =========================================================================
    // Bootstrap
    // =========================================================================

    /// Join the overlay from the configured seeds and persist everything
    /// reachable from the resulting routing table.
    ///
    /// The table is walked in id order: the first page holds up to
    /// `bootstrap_seed_limit` nodes, every later page `page_size`. Each walked
    /// node is asked directly for the nodes closest to its own id. The walked
    /// node and every node named in an answer are persisted. Per-peer failures
    /// are counted; a store failure aborts the bootstrap.
    pub async fn bootstrap(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BootstrapReport, OverlayError> {
        let local_id = self.dht.local_node().id;
        let mut report = BootstrapReport::default();
        let mut encountered: HashMap<NodeId, Node> = HashMap::new();
        let mut walked: HashMap<NodeId, Node> = HashMap::new();

        match self.dht.join(&self.config.seeds, cancel).await {
            Ok(join) => {
                report.seeds_reached = join.seeds_reached;
                report.seeds_failed = join.seeds_failed;
                merge_newest(&mut encountered, join.discovered, &local_id);
            }
            Err(OverlayError::Cancelled) => return Err(OverlayError::Cancelled),
            Err(err) => {
                report.join_failed = true;
                report.seeds_failed = self.config.seeds.len();
                warn!(seeds = self.config.seeds.len(), error = %err, "overlay join failed");
            }
        }

        let mut cursor = Some(NodeId::MIN);
        let mut limit = self.config.bootstrap_seed_limit;
        while let Some(start) = cursor {
            if cancel.is_cancelled() {
                break;
            }
            let page = self.dht.get_nodes(&start, limit);
            cursor = next_cursor(&page, limit);
            limit = self.config.page_size;
            report.walked += page.len();

            for chunk in page.chunks(self.concurrency) {
                let answers = join_all(chunk.iter().map(|node| async move {
                    let answer = self
                        .dht
                        .query_neighbors(node, node.id, self.config.page_size, cancel)
                        .await;
                    (node, answer)
                }))
                .await;

                for (node, answer) in answers {
                    walked.insert(node.id, node.clone());
                    match answer {
                        Ok(nodes) => {
                            report.contacted += 1;
                            merge_newest(&mut encountered, nodes, &local_id);
                        }
                        Err(OverlayError::Cancelled) => {}
                        Err(err) => {
                            report.failed += 1;
                            warn!(peer = %node.id.short(), addr = %node.address, error = %err, "bootstrap contact failed");
                        }
                    }
                }
            }
        }

        // Our own table records win over what peers reported about them.
        encountered.extend(walked);
        if encountered.is_empty() && cancel.is_cancelled() {
            return Err(OverlayError::Cancelled);
        }

        let mut records: Vec<Node> = encountered.into_values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        for node in &records {
            if let Err(err) = self.put(&node.id, node) {
                warn!(peer = %node.id.short(), error = %err, "bootstrap aborted on store failure");
                return Err(err);
            }
        }
        report.persisted = records.len();

        info!(
            seeds_reached = report.seeds_reached,
            walked = report.walked,
            contacted = report.contacted,
            failed = report.failed,
            persisted = report.persisted,
            "overlay bootstrap finished"
        );
        Ok(report)
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// One refresh cycle.
    ///
    /// Pings a page of nodes starting at a random id, then sweeps the whole
    /// routing table in pages, pinging every node not pinged yet in this
    /// cycle. Only nodes that answered are persisted; nodes evicted by the
    /// engine drop out of the table and are never written back. Per-node
    /// failures are counted; a store failure aborts the cycle.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<RefreshReport, OverlayError> {
        let page_size = self.config.page_size;
        let mut report = RefreshReport::default();
        let mut pinged: HashSet<NodeId> = HashSet::new();

        let sample = self.dht.get_nodes(&NodeId::random(), page_size);
        report.sampled = sample.len();
        pinged.extend(sample.iter().map(|n| n.id));
        self.ping_and_persist(&sample, cancel, &mut report).await?;

        let mut cursor = Some(NodeId::MIN);
        while let Some(start) = cursor {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let page = self.dht.get_nodes(&start, page_size);
            cursor = next_cursor(&page, page_size);

            let fresh: Vec<Node> = page.into_iter().filter(|n| pinged.insert(n.id)).collect();
            report.swept += fresh.len();
            self.ping_and_persist(&fresh, cancel, &mut report).await?;
        }

        info!(
            sampled = report.sampled,
            swept = report.swept,
            refreshed = report.refreshed,
            failed = report.failed,
            cancelled = report.cancelled,
            "overlay refresh finished"
        );
        Ok(report)
    }

    async fn ping_and_persist(
        &self,
        nodes: &[Node],
        cancel: &CancellationToken,
        report: &mut RefreshReport,
    ) -> Result<(), OverlayError> {
        for chunk in nodes.chunks(self.concurrency) {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(());
            }
            let results = join_all(chunk.iter().map(|node| self.dht.ping(node, cancel))).await;

            for (node, result) in chunk.iter().zip(results) {
                match result {
                    Ok(refreshed) => {
                        report.refreshed += 1;
                        if let Err(err) = self.put(&refreshed.id, &refreshed) {
                            warn!(peer = %refreshed.id.short(), error = %err, "refresh aborted on store failure");
                            return Err(err);
                        }
                        report.persisted += 1;
                    }
                    Err(OverlayError::Cancelled) => report.cancelled = true,
                    Err(err) => {
                        report.failed += 1;
                        warn!(peer = %node.id.short(), addr = %node.address, error = %err, "refresh ping failed");
                    }
                }
            }
        }
        debug!(batch = nodes.len(), "refresh batch done");
        Ok(())
    }
}

fn decode_record(bytes: &[u8]) -> Result<Node, OverlayError> {
    bincode::deserialize(bytes)
        .map_err(|e| OverlayError::MalformedInput(format!("undecodable node record: {}", e)))
}

/// Start of the page after `page`, or `None` once a short page ends the walk.
fn next_cursor(page: &[Node], limit: usize) -> Option<NodeId> {
    if page.len() < limit {
        return None;
    }
    page.last().and_then(|n| n.id.successor())
}

fn merge_newest<I: IntoIterator<Item = Node>>(
    into: &mut HashMap<NodeId, Node>,
    nodes: I,
    local_id: &NodeId,
) {
    for node in nodes {
        if &node.id == local_id {
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
