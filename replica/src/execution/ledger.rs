//! Balance encoding and lookups.
//!
//! Balances are stored under the raw address bytes as the big-endian
//! unsigned magnitude of the amount. A missing key reads as zero.

use crate::checkpoint::store::{CommittedView, LedgerStore};
use crate::storage::StorageError;
use crate::types::{Address, Balance};

pub fn encode_balance(balance: &Balance) -> Vec<u8> {
    balance.to_bytes_be()
}

pub fn decode_balance(bytes: &[u8]) -> Balance {
    Balance::from_bytes_be(bytes)
}

/// Balance including staged writes. Only the coordinator's write path uses this.
pub fn staged_balance(store: &dyn LedgerStore, address: &Address) -> Result<Balance, StorageError> {
    Ok(store
        .get(address.as_bytes())?
        .map(|bytes| decode_balance(&bytes))
        .unwrap_or_default())
}

/// Balance as of the latest commit.
pub fn committed_balance(
    view: &dyn CommittedView,
    address: &Address,
) -> Result<Balance, StorageError> {
    Ok(view
        .get_committed(address.as_bytes())?
        .map(|bytes| decode_balance(&bytes))
        .unwrap_or_default())
}
