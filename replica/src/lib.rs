//! Replica library crate.
//!
//! A replica follows a chain feed of blocks, applies the transfer
//! transactions it finds to a local balance ledger, and only commits a
//! checkpoint of that ledger once a quorum of peer replicas reports the same
//! root hash. Disagreement rolls the block back and replays it.
//!
//! - domain types (`types`),
//! - storage backends and the ledger Merkle root (`storage`),
//! - transaction application (`execution`),
//! - the chain feed abstraction (`feed`),
//! - quorum validation and the checkpoint coordinator (`checkpoint`),
//! - the HTTP peer root hash client (`peer_client`),
//! - committed-state queries (`query`),
//! - Prometheus metrics (`metrics`),
//! - configuration, genesis and CLI flags (`config`, `genesis`, `cli`),
//! - and node assembly (`node`).

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod execution;
pub mod feed;
pub mod genesis;
pub mod metrics;
pub mod node;
pub mod peer_client;
pub mod query;
pub mod storage;
pub mod types;

pub use config::{ConfigError, MetricsConfig, PeerClientConfig, ReplicaConfig, StorageBackend};

pub use checkpoint::{
    CheckpointCoordinator, CommittedView, CoordinatorConfig, CoordinatorError, CoordinatorPhase,
    EmptyRosterPolicy, InitError, LedgerStore, PeerRootHashClient, PeerRoster, QuorumConfig,
    QuorumDecision, QuorumTally, QuorumValidator, RoundOutcome, quorum_threshold,
};

pub use storage::{MemoryLedgerStore, RocksDbConfig, RocksDbLedgerStore, StorageError};

pub use execution::{ActionHandler, Outcome, Rejection, TransactionApplier, TransferHandler};
pub use feed::{ChainBlock, ChainFeed, FeedCursor, FeedError, MemoryChainFeed, Subscription};

pub use peer_client::HttpPeerClient;
pub use query::{QueryError, QueryService};

pub use metrics::{CheckpointMetrics, MetricsRegistry, run_prometheus_http_server};

pub use cli::NodeArgs;
pub use genesis::{GenesisConfig, GenesisError};
pub use node::{DefaultCoordinator, Node};

pub use types::*;
