use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use overlay_dht::adapters::StorageBackend;
use overlay_dht::{
    DhtService, InMemoryKeyValueStore, KeyValueStore, Node, NodeIdentity, NodesServer,
    OverlayCache, OverlayDht, OverlayEndpoint, OverlayError, QuicNodeClient, RefreshTask,
    SystemTimeSource, TimeSource,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::RuntimeConfig;

type Engine = DhtService<QuicNodeClient>;

/// Upper bound on waiting for peers to acknowledge connection close.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// A running overlay member.
pub struct NodeRuntime {
    endpoint: OverlayEndpoint,
    cache: Arc<OverlayCache<Engine>>,
    server: JoinHandle<()>,
    refresh: RefreshTask,
    cancel: CancellationToken,
}

impl NodeRuntime {
    /// Bring the node up and run the initial bootstrap.
    ///
    /// Per-peer failures during warm start and bootstrap are logged; only
    /// a store failure aborts startup.
    pub async fn start(config: RuntimeConfig) -> Result<Self> {
        let identity = Arc::new(load_identity(&config)?);
        info!(node_id = %identity.node_id(), "identity ready");

        let endpoint = OverlayEndpoint::bind(config.transport.clone(), identity)
            .context("failed to bind overlay endpoint")?;
        let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource::new());
        let local = Node::new(endpoint.node_id(), endpoint.advertised_addr()?, time.now());

        let client = Arc::new(
            QuicNodeClient::new(endpoint.client(), local.clone(), time.clone())
                .with_max_frame_size(config.transport.max_frame_size),
        );
        let dht = DhtService::new(local, config.kademlia.clone(), client, time);

        let cancel = CancellationToken::new();
        let server = NodesServer::new(dht.clone(), endpoint.clone()).spawn(cancel.clone());

        let store = open_store(&config)?;
        let cache = Arc::new(
            OverlayCache::new(Arc::new(dht), store, config.overlay.clone())
                .with_concurrency(config.kademlia.alpha),
        );

        match cache.warm_start(&cancel).await {
            Ok(revived) => info!(revived, "persisted membership checked"),
            Err(err) if err.is_fatal() => return Err(err).context("warm start failed"),
            Err(err) => warn!(error = %err, "warm start incomplete"),
        }

        match cache.bootstrap(&cancel).await {
            Ok(report) if report.join_failed && !config.overlay.seeds.is_empty() => {
                warn!(seeds = config.overlay.seeds.len(), "no seed reachable, running alone");
            }
            Ok(_) => {}
            Err(OverlayError::Cancelled) => {}
            Err(err) => return Err(err).context("bootstrap failed"),
        }

        let refresh = RefreshTask::spawn(
            cache.clone(),
            config.overlay.refresh_interval(),
            cancel.child_token(),
        );

        let stats = cache.dht().stats();
        info!(
            addr = %endpoint.local_addr()?,
            known = stats.total_nodes,
            refresh_secs = config.overlay.refresh_interval_secs,
            "overlay node started"
        );

        Ok(Self {
            endpoint,
            cache,
            server,
            refresh,
            cancel,
        })
    }

    /// Stop the refresh task and the responder, then close the endpoint.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        self.cancel.cancel();
        self.refresh.shutdown().await;
        if let Err(err) = self.server.await {
            error!(error = %err, "nodes server panicked");
        }

        self.endpoint.close();
        if tokio::time::timeout(CLOSE_GRACE, self.endpoint.wait_idle())
            .await
            .is_err()
        {
            warn!("connections did not close in time");
        }

        match self.cache.walk() {
            Ok(records) => info!(records = records.len(), "Shutdown complete"),
            Err(err) => warn!(error = %err, "Shutdown complete, cache unreadable"),
        }
    }
}

fn load_identity(config: &RuntimeConfig) -> Result<NodeIdentity> {
    match &config.settings.identity.key_path {
        Some(path) => NodeIdentity::load_or_generate(path)
            .with_context(|| format!("failed to load identity from {}", path.display())),
        None => {
            warn!("no identity.key_path configured, using an ephemeral identity");
            Ok(NodeIdentity::generate()?)
        }
    }
}

fn open_store(config: &RuntimeConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.settings.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryKeyValueStore::new())),
        StorageBackend::RocksDb => open_rocksdb(config),
    }
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(config: &RuntimeConfig) -> Result<Arc<dyn KeyValueStore>> {
    let path = &config.settings.storage.path;
    let store = overlay_dht::RocksDbStore::open_default(path)
        .with_context(|| format!("failed to open store at {}", path.display()))?;
    info!(path = %path.display(), "rocksdb store opened");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(_config: &RuntimeConfig) -> Result<Arc<dyn KeyValueStore>> {
    anyhow::bail!("storage.backend = \"rocksdb\" requires building with the rocksdb feature")
}
