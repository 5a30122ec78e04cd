//! Assembly of a complete replica node.
//!
//! [`Node::open`] turns a [`ReplicaConfig`] into a running set of parts:
//! ledger store (with genesis applied), metrics registry, HTTP peer client,
//! quorum validator, checkpoint coordinator and a feed subscription that
//! starts right after the last committed block. [`Node::run`] drives the
//! coordinator until shutdown and then closes the store.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};

use crate::checkpoint::{
    CheckpointCoordinator, CoordinatorError, InitError, LedgerStore, PeerRoster, QuorumValidator,
};
use crate::config::{ReplicaConfig, StorageBackend};
use crate::execution::TransactionApplier;
use crate::feed::{ChainFeed, MemoryChainFeed, Subscription, load_blocks};
use crate::metrics::{MetricsRegistry, run_prometheus_http_server};
use crate::peer_client::HttpPeerClient;
use crate::query::QueryService;
use crate::storage::{MemoryLedgerStore, RocksDbLedgerStore};

/// Coordinator stack used by the node binaries.
pub type DefaultCoordinator = CheckpointCoordinator<Box<dyn LedgerStore>, HttpPeerClient>;

/// Opens the configured storage backend.
pub fn open_store(backend: &StorageBackend) -> Result<Box<dyn LedgerStore>, InitError> {
    match backend {
        StorageBackend::Memory => Ok(Box::new(MemoryLedgerStore::new())),
        StorageBackend::RocksDb(cfg) => {
            let store = RocksDbLedgerStore::open(cfg).map_err(InitError::Store)?;
            info!(path = %cfg.path, "opened RocksDB ledger");
            Ok(Box::new(store))
        }
    }
}

pub struct Node {
    config: ReplicaConfig,
    coordinator: DefaultCoordinator,
    subscription: Subscription,
    feed: MemoryChainFeed,
    query: QueryService,
    metrics: Arc<MetricsRegistry>,
}

impl Node {
    /// Builds every part of the node. Must be called inside a tokio runtime.
    ///
    /// Genesis allocations are written last, once nothing else can fail, so
    /// a failed start leaves the ledger as it found it.
    pub fn open(config: ReplicaConfig) -> Result<Self, InitError> {
        config.validate()?;

        let metrics = Arc::new(MetricsRegistry::new()?);
        let client = HttpPeerClient::new(config.peer_client.clone()).map_err(InitError::PeerClient)?;
        let validator = QuorumValidator::new(client, config.quorum.clone());
        let roster = PeerRoster::new(config.peers.clone());
        if roster.is_empty() {
            info!(policy = ?config.quorum.empty_roster, "running without peers");
        }

        let feed = MemoryChainFeed::new();
        if let Some(path) = &config.blocks_file {
            let blocks = load_blocks(path)?;
            info!(path = %path.display(), blocks = blocks.len(), "loaded block file");
            for block in blocks {
                feed.push_block(block)?;
            }
        }

        let store = open_store(&config.storage)?;
        let query = QueryService::new(store.committed_view());

        let mut coordinator = CheckpointCoordinator::new(
            config.coordinator.clone(),
            store,
            TransactionApplier::default(),
            validator,
            roster,
        )
        .map_err(InitError::Store)?
        .with_metrics(metrics.checkpoint.clone());

        // Genesis never writes a checkpoint, so the start block is final here.
        let subscription = feed.subscribe(coordinator.next_block())?;

        coordinator
            .apply_genesis(&config.genesis)
            .map_err(InitError::Genesis)?;

        Ok(Self {
            config,
            coordinator,
            subscription,
            feed,
            query,
            metrics,
        })
    }

    /// Read side over committed state.
    pub fn query(&self) -> QueryService {
        self.query.clone()
    }

    /// Feed the node consumes; blocks appended here are processed in order.
    pub fn feed(&self) -> MemoryChainFeed {
        self.feed.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        self.metrics.clone()
    }

    /// Runs until `shutdown` resolves or the feed closes, then closes the
    /// ledger store.
    pub async fn run<F>(self, shutdown: F) -> Result<(), CoordinatorError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            mut coordinator,
            subscription,
            metrics,
            ..
        } = self;

        if config.metrics.enabled {
            let addr = config.metrics.listen_addr;
            tokio::spawn(async move {
                if let Err(e) = run_prometheus_http_server(metrics, addr).await {
                    error!("metrics HTTP server error: {e}");
                }
            });
            info!("metrics exporter listening on http://{}/metrics", addr);
        }

        let result = coordinator.run(subscription, shutdown).await;
        coordinator.shutdown()?;
        result
    }
}
