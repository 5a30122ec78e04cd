//! Read-only lookups against committed ledger state.

use std::sync::Arc;

use crate::checkpoint::CommittedView;
use crate::execution::ledger::committed_balance;
use crate::storage::StorageError;
use crate::types::{Address, AddressError, Balance, Checkpoint, StateDigest};

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("block number must be positive, got {0}")]
    NonPositiveBlock(i64),
    #[error("block {requested} is beyond the latest committed block {latest}")]
    BeyondLatest { requested: u64, latest: u64 },
    #[error("no checkpoint was committed at block {0}")]
    NotFound(u64),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl QueryError {
    /// Whether the caller asked for something invalid, as opposed to the
    /// replica failing to answer.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Storage(_))
    }
}

/// Balance and digest lookups for clients and peer replicas.
///
/// Reads only ever see committed state; writes staged by an in-progress
/// round are invisible here.
#[derive(Clone)]
pub struct QueryService {
    view: Arc<dyn CommittedView>,
}

impl QueryService {
    pub fn new(view: Arc<dyn CommittedView>) -> Self {
        Self { view }
    }

    /// Committed balance of `address`; unknown accounts hold zero.
    pub fn balance(&self, address: &Address) -> Result<Balance, QueryError> {
        Ok(committed_balance(self.view.as_ref(), address)?)
    }

    pub fn balance_of_hex(&self, address: &str) -> Result<Balance, QueryError> {
        let address = Address::from_hex(address)?;
        self.balance(&address)
    }

    /// Digest of the checkpoint committed at `block_number`.
    ///
    /// The latest height returns the latest digest; lower heights need an
    /// exact checkpoint. Non-positive heights and heights past the latest
    /// checkpoint are invalid.
    pub fn root_hash(&self, block_number: i64) -> Result<StateDigest, QueryError> {
        let requested =
            u64::try_from(block_number).map_err(|_| QueryError::NonPositiveBlock(block_number))?;
        if requested == 0 {
            return Err(QueryError::NonPositiveBlock(block_number));
        }

        let Some(latest) = self.view.latest_checkpoint()? else {
            return Err(QueryError::BeyondLatest {
                requested,
                latest: 0,
            });
        };

        if requested == latest.block_number {
            return Ok(latest.digest);
        }
        if requested > latest.block_number {
            return Err(QueryError::BeyondLatest {
                requested,
                latest: latest.block_number,
            });
        }

        self.view
            .checkpoint_at(requested)?
            .map(|cp| cp.digest)
            .ok_or(QueryError::NotFound(requested))
    }

    pub fn latest_checkpoint(&self) -> Result<Option<Checkpoint>, QueryError> {
        Ok(self.view.latest_checkpoint()?)
    }
}
