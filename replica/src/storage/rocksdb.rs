//! RocksDB-backed ledger store.
//!
//! This implementation persists balances and checkpoints in a RocksDB
//! instance with dedicated column families:
//!
//! - `"ledger"`:      maps account key -> big-endian balance bytes,
//! - `"checkpoints"`: maps block number (8 bytes, big-endian) -> encoded
//!   [`Checkpoint`].
//!
//! Staged writes are held in memory until commit, so readers going through
//! the database never observe them. Commit writes the staged balances and
//! the checkpoint in one `WriteBatch`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::checkpoint::store::{CommittedView, LedgerStore};
use crate::types::{Checkpoint, StateDigest};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use super::StorageError;
use super::merkle::{hash_leaf, root_from_leaves};

type LedgerDb = DBWithThreadMode<MultiThreaded>;

const CF_LEDGER: &str = "ledger";
const CF_CHECKPOINTS: &str = "checkpoints";

/// Configuration for [`RocksDbLedgerStore`].
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/vida-ledger".to_string(),
            create_if_missing: true,
        }
    }
}

/// RocksDB-backed implementation of [`LedgerStore`].
pub struct RocksDbLedgerStore {
    db: Arc<LedgerDb>,
    staged: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl RocksDbLedgerStore {
    /// Opens (or creates) a RocksDB-backed ledger store at the given path.
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_LEDGER, Options::default()),
            ColumnFamilyDescriptor::new(CF_CHECKPOINTS, Options::default()),
        ];

        let db = LedgerDb::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            staged: BTreeMap::new(),
        })
    }
}

fn cf<'a>(db: &'a LedgerDb, name: &'static str) -> Result<Arc<BoundColumnFamily<'a>>, StorageError> {
    db.cf_handle(name)
        .ok_or(StorageError::MissingColumnFamily(name))
}

fn encode_checkpoint(cp: &Checkpoint) -> Result<Vec<u8>, StorageError> {
    bincode::serde::encode_to_vec(cp, bincode::config::standard())
        .map_err(|e| StorageError::Encoding(e.to_string()))
}

fn decode_checkpoint(bytes: &[u8]) -> Result<Checkpoint, StorageError> {
    let (cp, _): (Checkpoint, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StorageError::Corrupted(format!("checkpoint: {e}")))?;
    Ok(cp)
}

fn latest_checkpoint(db: &LedgerDb) -> Result<Option<Checkpoint>, StorageError> {
    let cf_checkpoints = cf(db, CF_CHECKPOINTS)?;
    match db.iterator_cf(&cf_checkpoints, IteratorMode::End).next() {
        None => Ok(None),
        Some(item) => {
            let (_, value) = item?;
            decode_checkpoint(&value).map(Some)
        }
    }
}

impl LedgerStore for RocksDbLedgerStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(value) = self.staged.get(key) {
            return Ok(Some(value.clone()));
        }
        let cf_ledger = cf(&self.db, CF_LEDGER)?;
        Ok(self.db.get_cf(&cf_ledger, key)?)
    }

    fn put_batch(&mut self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), StorageError> {
        self.staged.extend(entries);
        Ok(())
    }

    fn digest(&self) -> Result<StateDigest, StorageError> {
        let cf_ledger = cf(&self.db, CF_LEDGER)?;

        // Both sides are key-ordered: merge them, staged values shadowing
        // committed ones.
        let mut staged = self.staged.iter().peekable();
        let mut leaves = Vec::new();
        for item in self.db.iterator_cf(&cf_ledger, IteratorMode::Start) {
            let (key, value) = item?;
            while let Some((k, v)) = staged.next_if(|(k, _)| k.as_slice() < &*key) {
                leaves.push(hash_leaf(k, v));
            }
            match staged.next_if(|(k, _)| k.as_slice() == &*key) {
                Some((_, v)) => leaves.push(hash_leaf(&key, v)),
                None => leaves.push(hash_leaf(&key, &value)),
            }
        }
        leaves.extend(staged.map(|(k, v)| hash_leaf(k, v)));

        Ok(root_from_leaves(leaves).into())
    }

    fn has_uncommitted(&self) -> bool {
        !self.staged.is_empty()
    }

    fn commit(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), StorageError> {
        let cf_ledger = cf(&self.db, CF_LEDGER)?;
        let mut batch = WriteBatch::default();

        for (key, value) in &self.staged {
            batch.put_cf(&cf_ledger, key, value);
        }

        if let Some(cp) = checkpoint {
            if !cp.is_committed() {
                return Err(StorageError::UncommittedCheckpoint(cp.block_number));
            }
            if let Some(latest) = latest_checkpoint(&self.db)? {
                if cp.block_number <= latest.block_number {
                    return Err(StorageError::NonMonotonicCheckpoint {
                        latest: latest.block_number,
                        attempted: cp.block_number,
                    });
                }
            }
            let cf_checkpoints = cf(&self.db, CF_CHECKPOINTS)?;
            batch.put_cf(
                &cf_checkpoints,
                cp.block_number.to_be_bytes(),
                encode_checkpoint(cp)?,
            );
        }

        self.db.write(batch)?;
        self.staged.clear();
        Ok(())
    }

    fn revert_uncommitted(&mut self) -> Result<(), StorageError> {
        self.staged.clear();
        Ok(())
    }

    fn committed_view(&self) -> Arc<dyn CommittedView> {
        Arc::new(RocksDbCommittedView {
            db: self.db.clone(),
        })
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.staged.clear();
        for name in [CF_LEDGER, CF_CHECKPOINTS] {
            let handle = cf(&self.db, name)?;
            self.db.flush_cf(&handle)?;
        }
        Ok(())
    }
}

/// Reader handle over the committed column families.
struct RocksDbCommittedView {
    db: Arc<LedgerDb>,
}

impl CommittedView for RocksDbCommittedView {
    fn get_committed(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf_ledger = cf(&self.db, CF_LEDGER)?;
        Ok(self.db.get_cf(&cf_ledger, key)?)
    }

    fn latest_checkpoint(&self) -> Result<Option<Checkpoint>, StorageError> {
        latest_checkpoint(&self.db)
    }

    fn checkpoint_at(&self, block_number: u64) -> Result<Option<Checkpoint>, StorageError> {
        let cf_checkpoints = cf(&self.db, CF_CHECKPOINTS)?;
        match self.db.get_cf(&cf_checkpoints, block_number.to_be_bytes())? {
            None => Ok(None),
            Some(bytes) => decode_checkpoint(&bytes).map(Some),
        }
    }
}
