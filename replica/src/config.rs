//! Top-level configuration for a replica node.
//!
//! This module aggregates configuration for:
//!
//! - the checkpoint coordinator (`CoordinatorConfig`),
//! - quorum validation (`QuorumConfig`) and the peer roster,
//! - the HTTP peer client (request timeout + retries),
//! - storage (in-memory or RocksDB),
//! - the metrics exporter (enable flag + listen address),
//! - genesis allocations and an optional block file for the feed.
//!
//! Binaries build a [`ReplicaConfig`] from defaults overlaid with command
//! line flags (see [`crate::cli::NodeArgs`]) and check it with
//! [`ReplicaConfig::validate`] before opening anything.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::checkpoint::{CoordinatorConfig, QuorumConfig};
use crate::genesis::GenesisConfig;
use crate::storage::RocksDbConfig;
use crate::types::PeerId;

/// Configuration for the HTTP peer root hash client.
#[derive(Clone, Debug)]
pub struct PeerClientConfig {
    /// Timeout of a single HTTP request.
    pub request_timeout: Duration,
    /// Attempts per peer per round on transport errors.
    pub max_attempts: u32,
}

impl Default for PeerClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(900),
            max_attempts: 2,
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9898)),
        }
    }
}

/// Where the ledger lives.
#[derive(Clone, Debug)]
pub enum StorageBackend {
    /// Throwaway in-memory ledger.
    Memory,
    RocksDb(RocksDbConfig),
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::RocksDb(RocksDbConfig::default())
    }
}

/// Rejected configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("start block must be at least 1")]
    ZeroStartBlock,
    #[error("peer timeout must be positive")]
    ZeroPeerTimeout,
    #[error("peer client needs at least one attempt")]
    ZeroAttempts,
    #[error("peer {0} is listed more than once")]
    DuplicatePeer(PeerId),
    #[error("peer address must not be empty")]
    EmptyPeer,
}

/// Top-level configuration for a replica node.
#[derive(Clone, Debug, Default)]
pub struct ReplicaConfig {
    pub coordinator: CoordinatorConfig,
    pub quorum: QuorumConfig,
    pub peer_client: PeerClientConfig,
    pub storage: StorageBackend,
    pub metrics: MetricsConfig,
    pub genesis: GenesisConfig,
    /// Peer replicas asked to confirm each checkpoint.
    pub peers: Vec<PeerId>,
    /// Blocks to preload into the in-memory feed.
    pub blocks_file: Option<PathBuf>,
}

impl ReplicaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinator.start_block == 0 {
            return Err(ConfigError::ZeroStartBlock);
        }
        if self.quorum.peer_timeout.is_zero() {
            return Err(ConfigError::ZeroPeerTimeout);
        }
        if self.peer_client.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }

        let mut seen = HashSet::new();
        for peer in &self.peers {
            if peer.as_str().trim().is_empty() {
                return Err(ConfigError::EmptyPeer);
            }
            if !seen.insert(peer) {
                return Err(ConfigError::DuplicatePeer(peer.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ReplicaConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.coordinator.start_block, 1);
        assert_eq!(cfg.metrics.listen_addr.port(), 9898);
        assert!(matches!(cfg.storage, StorageBackend::RocksDb(_)));
    }

    #[test]
    fn duplicate_and_empty_peers_are_rejected() {
        let cfg = ReplicaConfig {
            peers: vec![PeerId::from("a:1"), PeerId::from("b:1"), PeerId::from("a:1")],
            ..ReplicaConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::DuplicatePeer(PeerId::from("a:1"))));

        let cfg = ReplicaConfig {
            peers: vec![PeerId::from(" ")],
            ..ReplicaConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyPeer));
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut cfg = ReplicaConfig::default();
        cfg.coordinator.start_block = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroStartBlock));

        let mut cfg = ReplicaConfig::default();
        cfg.quorum.peer_timeout = Duration::ZERO;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroPeerTimeout));

        let mut cfg = ReplicaConfig::default();
        cfg.peer_client.max_attempts = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAttempts));
    }
}
