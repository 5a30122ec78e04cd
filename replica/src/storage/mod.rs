//! Storage backends for the replica.
//!
//! This module provides concrete implementations of the
//! [`crate::checkpoint::store::LedgerStore`] trait, including:
//!
//! - an in-memory store ([`mem::MemoryLedgerStore`]) suitable for tests and
//!   throwaway nodes,
//! - a RocksDB-backed store ([`rocksdb::RocksDbLedgerStore`]) for persistent
//!   replicas,
//!
//! together with the Merkle root computation both of them use for
//! [`LedgerStore::digest`](crate::checkpoint::store::LedgerStore::digest).

pub mod mem;
pub mod merkle;
pub mod rocksdb;

pub use mem::MemoryLedgerStore;
pub use rocksdb::{RocksDbConfig, RocksDbLedgerStore};

/// Storage-level error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying RocksDB error.
    #[error("rocksdb: {0}")]
    RocksDb(#[from] ::rocksdb::Error),
    /// Required column family was not found.
    #[error("missing column family {0:?}")]
    MissingColumnFamily(&'static str),
    /// A stored record could not be decoded.
    #[error("corrupted record: {0}")]
    Corrupted(String),
    /// A record could not be encoded for writing.
    #[error("encoding failed: {0}")]
    Encoding(String),
    /// A lock guarding shared state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
    /// Checkpoints must be committed with strictly increasing heights.
    #[error("checkpoint {attempted} does not advance latest committed checkpoint {latest}")]
    NonMonotonicCheckpoint { latest: u64, attempted: u64 },
    /// Checkpoints handed to `commit` must already be confirmed.
    #[error("checkpoint {0} is not marked committed")]
    UncommittedCheckpoint(u64),
}
