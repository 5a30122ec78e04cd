//! Initial balance allocations.
//!
//! Transfers only move balances around, so a fresh ledger needs funded
//! accounts to start from. Genesis allocations are written once, to an
//! empty store without checkpoints, and committed without a checkpoint of
//! their own: no block height is ever reported for them.
//!
//! The file format is a JSON object from hex address to amount:
//!
//! ```json
//! { "0xa1a1...": "100", "0xb0b0...": 25 }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use crate::checkpoint::LedgerStore;
use crate::execution::ledger::encode_balance;
use crate::storage::StorageError;
use crate::types::{Address, AddressError, Balance, PayloadError, StateDigest};
use crate::types::tx::parse_amount;

#[derive(Debug, thiserror::Error)]
pub enum GenesisError {
    #[error("failed to read genesis file: {0}")]
    Io(#[from] std::io::Error),
    #[error("genesis file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("genesis address {key:?}: {source}")]
    InvalidAddress {
        key: String,
        #[source]
        source: AddressError,
    },
    #[error("genesis amount for {key:?}: {source}")]
    InvalidAmount {
        key: String,
        #[source]
        source: PayloadError,
    },
    #[error("address {0} is allocated more than once")]
    Duplicate(Address),
}

/// Balances to seed an empty ledger with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenesisConfig {
    pub allocations: Vec<(Address, Balance)>,
}

impl GenesisConfig {
    pub fn from_json_str(text: &str) -> Result<Self, GenesisError> {
        let entries: Map<String, Value> = serde_json::from_str(text)?;

        let mut seen = HashSet::new();
        let mut allocations = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let address = Address::from_hex(&key).map_err(|source| GenesisError::InvalidAddress {
                key: key.clone(),
                source,
            })?;
            let amount =
                parse_amount(&value).map_err(|source| GenesisError::InvalidAmount { key, source })?;
            if !seen.insert(address) {
                return Err(GenesisError::Duplicate(address));
            }
            allocations.push((address, amount));
        }
        allocations.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self { allocations })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, GenesisError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn total_supply(&self) -> Balance {
        self.allocations.iter().map(|(_, amount)| amount).sum()
    }
}

/// Seeds `store` with `genesis` if it has never been used.
///
/// Returns `true` when allocations were written. A store that already holds
/// a checkpoint or any ledger entry is left untouched.
pub fn apply_genesis(
    store: &mut dyn LedgerStore,
    genesis: &GenesisConfig,
) -> Result<bool, StorageError> {
    if genesis.is_empty() {
        return Ok(false);
    }
    if store.committed_view().latest_checkpoint()?.is_some()
        || store.digest()? != StateDigest::empty()
    {
        info!("ledger already initialised; skipping genesis allocations");
        return Ok(false);
    }

    let entries = genesis
        .allocations
        .iter()
        .map(|(address, amount)| (address.as_bytes().to_vec(), encode_balance(amount)))
        .collect();
    store.put_batch(entries)?;
    store.commit(None)?;

    info!(
        accounts = genesis.allocations.len(),
        supply = %genesis.total_supply(),
        "genesis allocations committed"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ledger::committed_balance;
    use crate::storage::MemoryLedgerStore;
    use crate::types::Checkpoint;

    const ALICE: Address = Address([0xa1; 20]);
    const BOB: Address = Address([0xb0; 20]);

    fn genesis() -> GenesisConfig {
        GenesisConfig::from_json_str(&format!(r#"{{"{BOB}": 25, "{ALICE}": "100"}}"#)).unwrap()
    }

    #[test]
    fn parses_string_and_integer_amounts() {
        let cfg = genesis();
        assert_eq!(
            cfg.allocations,
            vec![(ALICE, Balance::from(100u32)), (BOB, Balance::from(25u32))]
        );
        assert_eq!(cfg.total_supply(), Balance::from(125u32));
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(matches!(
            GenesisConfig::from_json_str(r#"{"0x12": "1"}"#),
            Err(GenesisError::InvalidAddress { .. })
        ));
        assert!(matches!(
            GenesisConfig::from_json_str(&format!(r#"{{"{ALICE}": "-1"}}"#)),
            Err(GenesisError::InvalidAmount { .. })
        ));

        let upper = ALICE.to_string().to_uppercase().replacen("0X", "", 1);
        let text = format!(r#"{{"{ALICE}": "1", "{upper}": "2"}}"#);
        assert!(matches!(
            GenesisConfig::from_json_str(&text),
            Err(GenesisError::Duplicate(addr)) if addr == ALICE
        ));
    }

    #[test]
    fn applies_once_to_a_fresh_store_without_checkpoint() {
        let mut store = MemoryLedgerStore::new();
        assert!(apply_genesis(&mut store, &genesis()).unwrap());

        let view = store.committed_view();
        assert_eq!(committed_balance(view.as_ref(), &ALICE).unwrap(), Balance::from(100u32));
        assert_eq!(view.latest_checkpoint().unwrap(), None);

        assert!(!apply_genesis(&mut store, &genesis()).unwrap());
        assert_eq!(committed_balance(view.as_ref(), &BOB).unwrap(), Balance::from(25u32));
    }

    #[test]
    fn skips_a_store_with_checkpoints() {
        let mut store = MemoryLedgerStore::new();
        let cp = Checkpoint::pending(3, store.digest().unwrap()).commit();
        store.commit(Some(&cp)).unwrap();

        assert!(!apply_genesis(&mut store, &genesis()).unwrap());
        assert!(store.is_empty());
    }
}
