//! Storage abstraction used by the checkpoint coordinator.

use std::sync::Arc;

use crate::storage::StorageError;
use crate::types::{Checkpoint, StateDigest};

/// Read-only view over committed ledger state.
///
/// This is what the query side holds. Implementations must never expose
/// writes that are still staged on the [`LedgerStore`].
pub trait CommittedView: Send + Sync {
    /// Fetches a committed value.
    fn get_committed(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Returns the most recent committed checkpoint, if any.
    fn latest_checkpoint(&self) -> Result<Option<Checkpoint>, StorageError>;

    /// Returns the committed checkpoint recorded for exactly `block_number`.
    fn checkpoint_at(&self, block_number: u64) -> Result<Option<Checkpoint>, StorageError>;
}

/// Versioned key-value store holding account balances.
///
/// Writes are staged until [`LedgerStore::commit`]; reads through the store
/// itself see staged-over-committed state, reads through
/// [`LedgerStore::committed_view`] see committed state only. Only the
/// checkpoint coordinator holds a `LedgerStore`.
pub trait LedgerStore: Send {
    /// Fetches a value, staged writes included.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stages a single write.
    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StorageError> {
        self.put_batch(vec![(key.to_vec(), value)])
    }

    /// Stages several writes as one unit: either all are staged or none.
    fn put_batch(&mut self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), StorageError>;

    /// Root hash over the whole keyspace, staged writes included.
    fn digest(&self) -> Result<StateDigest, StorageError>;

    /// Returns `true` if there are writes that have not been committed.
    fn has_uncommitted(&self) -> bool;

    /// Publishes all staged writes and, if given, records `checkpoint`, in a
    /// single atomic step.
    ///
    /// Checkpoint block numbers must strictly increase.
    fn commit(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), StorageError>;

    /// Discards every write staged since the last commit.
    fn revert_uncommitted(&mut self) -> Result<(), StorageError>;

    /// Shared handle for readers of committed state.
    fn committed_view(&self) -> Arc<dyn CommittedView>;

    /// Releases the underlying resources. Staged writes are discarded.
    fn close(&mut self) -> Result<(), StorageError>;
}

impl<T: LedgerStore + ?Sized> LedgerStore for Box<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key)
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StorageError> {
        (**self).put(key, value)
    }

    fn put_batch(&mut self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), StorageError> {
        (**self).put_batch(entries)
    }

    fn digest(&self) -> Result<StateDigest, StorageError> {
        (**self).digest()
    }

    fn has_uncommitted(&self) -> bool {
        (**self).has_uncommitted()
    }

    fn commit(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), StorageError> {
        (**self).commit(checkpoint)
    }

    fn revert_uncommitted(&mut self) -> Result<(), StorageError> {
        (**self).revert_uncommitted()
    }

    fn committed_view(&self) -> Arc<dyn CommittedView> {
        (**self).committed_view()
    }

    fn close(&mut self) -> Result<(), StorageError> {
        (**self).close()
    }
}
