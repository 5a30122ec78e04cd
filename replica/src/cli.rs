//! Command-line flags shared by the replica binaries.
//!
//! Every flag can also be set through the environment variable named next
//! to it; flags win over the environment, which wins over the defaults in
//! [`ReplicaConfig`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::checkpoint::EmptyRosterPolicy;
use crate::config::{ReplicaConfig, StorageBackend};
use crate::genesis::{GenesisConfig, GenesisError};
use crate::storage::RocksDbConfig;
use crate::types::PeerId;

#[derive(Args, Clone, Debug)]
pub struct NodeArgs {
    /// Peer replicas asked to confirm checkpoints (host:port or URL).
    #[arg(env = "REPLICA_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Directory of the RocksDB ledger.
    #[arg(long, env = "REPLICA_DATA_DIR", default_value = "data/vida-ledger")]
    pub data_dir: PathBuf,

    /// Keep the ledger in memory instead of RocksDB.
    #[arg(long, env = "REPLICA_IN_MEMORY")]
    pub in_memory: bool,

    /// First block to process when the ledger has no checkpoint.
    #[arg(long, env = "REPLICA_START_BLOCK", default_value_t = 1)]
    pub start_block: u64,

    /// JSON block file preloaded into the feed.
    #[arg(long, env = "REPLICA_BLOCKS_FILE")]
    pub blocks_file: Option<PathBuf>,

    /// JSON genesis allocations, applied to an empty ledger.
    #[arg(long, env = "REPLICA_GENESIS_FILE")]
    pub genesis_file: Option<PathBuf>,

    /// Commit local digests when no peers are configured.
    #[arg(long, env = "REPLICA_TRUST_LOCAL")]
    pub trust_local: bool,

    /// Per-peer timeout of a validation round, in milliseconds.
    #[arg(long, env = "REPLICA_PEER_TIMEOUT_MS", default_value_t = 2000)]
    pub peer_timeout_ms: u64,

    /// Pause after a reverted round, in milliseconds.
    #[arg(long, env = "REPLICA_RETRY_DELAY_MS", default_value_t = 500)]
    pub retry_delay_ms: u64,

    /// Address of the Prometheus exporter.
    #[arg(long, env = "REPLICA_METRICS_LISTEN", default_value = "127.0.0.1:9898")]
    pub metrics_listen: SocketAddr,

    /// Do not run the Prometheus exporter.
    #[arg(long, env = "REPLICA_NO_METRICS")]
    pub no_metrics: bool,
}

impl NodeArgs {
    /// Overlays the flags on the default configuration.
    pub fn into_config(self) -> Result<ReplicaConfig, GenesisError> {
        let mut cfg = ReplicaConfig::default();

        cfg.peers = self
            .peers
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(PeerId::from)
            .collect();

        cfg.storage = if self.in_memory {
            StorageBackend::Memory
        } else {
            StorageBackend::RocksDb(RocksDbConfig {
                path: self.data_dir.to_string_lossy().into_owned(),
                ..RocksDbConfig::default()
            })
        };

        cfg.coordinator.start_block = self.start_block;
        cfg.coordinator.retry_delay = Duration::from_millis(self.retry_delay_ms);
        cfg.quorum.peer_timeout = Duration::from_millis(self.peer_timeout_ms);
        if self.trust_local {
            cfg.quorum.empty_roster = EmptyRosterPolicy::TrustLocal;
        }

        cfg.metrics.enabled = !self.no_metrics;
        cfg.metrics.listen_addr = self.metrics_listen;

        if let Some(path) = &self.genesis_file {
            cfg.genesis = GenesisConfig::from_json_file(path)?;
        }
        cfg.blocks_file = self.blocks_file;

        Ok(cfg)
    }
}
