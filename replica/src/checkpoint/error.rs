use crate::config::ConfigError;
use crate::feed::FeedError;
use crate::storage::StorageError;

/// Errors that stop the checkpoint coordinator.
///
/// Rejected transactions, failed quorum rounds and storage hiccups while
/// applying a block are not errors: they are reported as round outcomes and
/// the block is retried. What remains here leaves the ledger in a state the
/// coordinator cannot reason about.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Staged writes could not be discarded.
    #[error("failed to discard staged writes: {0}")]
    Revert(#[source] StorageError),
    /// The store could not be closed cleanly.
    #[error("failed to close ledger store: {0}")]
    Close(#[source] StorageError),
    /// The feed cursor could not be rewound.
    #[error("chain feed: {0}")]
    Feed(#[from] FeedError),
}

/// Errors raised while assembling a node. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to open ledger store: {0}")]
    Store(#[source] StorageError),
    #[error("failed to apply genesis allocations: {0}")]
    Genesis(#[source] StorageError),
    #[error("failed to set up chain feed: {0}")]
    Feed(#[from] FeedError),
    #[error("failed to build peer client: {0}")]
    PeerClient(#[source] reqwest::Error),
    #[error("failed to initialise metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),
}
