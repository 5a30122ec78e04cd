//! In-memory ledger store.
//!
//! This implementation is useful for unit tests, simulations and throwaway
//! nodes. Committed state lives behind an `RwLock` shared with every
//! [`CommittedView`]; staged writes live in a private overlay that readers
//! never see. Commit moves the overlay and the checkpoint into committed
//! state under a single write lock.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::checkpoint::store::{CommittedView, LedgerStore};
use crate::types::{Checkpoint, StateDigest};

use super::StorageError;
use super::merkle::ledger_root;

#[derive(Default)]
struct CommittedState {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    checkpoints: BTreeMap<u64, Checkpoint>,
}

/// In-memory implementation of [`LedgerStore`].
#[derive(Default)]
pub struct MemoryLedgerStore {
    committed: Arc<RwLock<CommittedState>>,
    staged: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryLedgerStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.committed
            .read()
            .map(|state| state.entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(value) = self.staged.get(key) {
            return Ok(Some(value.clone()));
        }
        let state = self
            .committed
            .read()
            .map_err(|_| StorageError::LockPoisoned("memory ledger"))?;
        Ok(state.entries.get(key).cloned())
    }

    fn put_batch(&mut self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), StorageError> {
        self.staged.extend(entries);
        Ok(())
    }

    fn digest(&self) -> Result<StateDigest, StorageError> {
        let state = self
            .committed
            .read()
            .map_err(|_| StorageError::LockPoisoned("memory ledger"))?;

        let mut merged: BTreeMap<&[u8], &[u8]> = state
            .entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .collect();
        merged.extend(self.staged.iter().map(|(k, v)| (k.as_slice(), v.as_slice())));

        Ok(ledger_root(merged).into())
    }

    fn has_uncommitted(&self) -> bool {
        !self.staged.is_empty()
    }

    fn commit(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), StorageError> {
        let mut state = self
            .committed
            .write()
            .map_err(|_| StorageError::LockPoisoned("memory ledger"))?;

        if let Some(cp) = checkpoint {
            if !cp.is_committed() {
                return Err(StorageError::UncommittedCheckpoint(cp.block_number));
            }
            if let Some((&latest, _)) = state.checkpoints.last_key_value() {
                if cp.block_number <= latest {
                    return Err(StorageError::NonMonotonicCheckpoint {
                        latest,
                        attempted: cp.block_number,
                    });
                }
            }
        }

        state.entries.append(&mut self.staged);
        if let Some(cp) = checkpoint {
            state.checkpoints.insert(cp.block_number, cp.clone());
        }
        Ok(())
    }

    fn revert_uncommitted(&mut self) -> Result<(), StorageError> {
        self.staged.clear();
        Ok(())
    }

    fn committed_view(&self) -> Arc<dyn CommittedView> {
        Arc::new(MemoryCommittedView {
            committed: self.committed.clone(),
        })
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.staged.clear();
        Ok(())
    }
}

/// Reader handle over a [`MemoryLedgerStore`]'s committed state.
struct MemoryCommittedView {
    committed: Arc<RwLock<CommittedState>>,
}

impl CommittedView for MemoryCommittedView {
    fn get_committed(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let state = self
            .committed
            .read()
            .map_err(|_| StorageError::LockPoisoned("memory ledger"))?;
        Ok(state.entries.get(key).cloned())
    }

    fn latest_checkpoint(&self) -> Result<Option<Checkpoint>, StorageError> {
        let state = self
            .committed
            .read()
            .map_err(|_| StorageError::LockPoisoned("memory ledger"))?;
        Ok(state.checkpoints.last_key_value().map(|(_, cp)| cp.clone()))
    }

    fn checkpoint_at(&self, block_number: u64) -> Result<Option<Checkpoint>, StorageError> {
        let state = self
            .committed
            .read()
            .map_err(|_| StorageError::LockPoisoned("memory ledger"))?;
        Ok(state.checkpoints.get(&block_number).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed_checkpoint(block: u64, store: &MemoryLedgerStore) -> Checkpoint {
        Checkpoint::pending(block, store.digest().unwrap()).commit()
    }

    #[test]
    fn staged_writes_are_invisible_to_readers_until_commit() {
        let mut store = MemoryLedgerStore::new();
        let view = store.committed_view();

        store.put(b"alice", vec![100]).unwrap();
        assert_eq!(store.get(b"alice").unwrap(), Some(vec![100]));
        assert_eq!(view.get_committed(b"alice").unwrap(), None);

        let cp = committed_checkpoint(1, &store);
        store.commit(Some(&cp)).unwrap();

        assert_eq!(view.get_committed(b"alice").unwrap(), Some(vec![100]));
        assert_eq!(view.latest_checkpoint().unwrap(), Some(cp.clone()));
        assert_eq!(view.checkpoint_at(1).unwrap(), Some(cp));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn revert_restores_last_committed_digest_exactly() {
        let mut store = MemoryLedgerStore::new();
        store.put(b"alice", vec![100]).unwrap();
        store.commit(None).unwrap();
        let committed_digest = store.digest().unwrap();

        store
            .put_batch(vec![(b"alice".to_vec(), vec![70]), (b"bob".to_vec(), vec![30])])
            .unwrap();
        assert_ne!(store.digest().unwrap(), committed_digest);

        store.revert_uncommitted().unwrap();
        assert!(!store.has_uncommitted());
        assert_eq!(store.digest().unwrap(), committed_digest);
        assert_eq!(store.get(b"bob").unwrap(), None);
    }

    #[test]
    fn digest_does_not_depend_on_write_order() {
        let mut a = MemoryLedgerStore::new();
        a.put(b"x", vec![1]).unwrap();
        a.put(b"y", vec![2]).unwrap();

        let mut b = MemoryLedgerStore::new();
        b.put(b"y", vec![2]).unwrap();
        b.commit(None).unwrap();
        b.put(b"x", vec![1]).unwrap();

        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn empty_store_has_empty_digest() {
        let store = MemoryLedgerStore::new();
        assert_eq!(store.digest().unwrap(), StateDigest::empty());
        assert!(store.is_empty());
    }

    #[test]
    fn checkpoints_must_strictly_increase() {
        let mut store = MemoryLedgerStore::new();
        let cp5 = committed_checkpoint(5, &store);
        store.commit(Some(&cp5)).unwrap();

        store.put(b"k", vec![1]).unwrap();
        let cp5_again = committed_checkpoint(5, &store);
        let err = store.commit(Some(&cp5_again)).unwrap_err();
        assert!(matches!(
            err,
            StorageError::NonMonotonicCheckpoint {
                latest: 5,
                attempted: 5
            }
        ));
        // The failed commit leaves the staged write in place.
        assert!(store.has_uncommitted());
    }

    #[test]
    fn pending_checkpoint_is_refused() {
        let mut store = MemoryLedgerStore::new();
        let pending = Checkpoint::pending(1, StateDigest::empty());
        assert!(matches!(
            store.commit(Some(&pending)),
            Err(StorageError::UncommittedCheckpoint(1))
        ));
    }
}
