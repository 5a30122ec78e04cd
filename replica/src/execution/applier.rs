//! Transaction dispatch.

use std::collections::HashMap;

use crate::checkpoint::store::LedgerStore;
use crate::storage::StorageError;
use crate::types::{ActionEnvelope, Balance, FeedTransaction, PayloadError};

use super::transfer::TransferHandler;

/// Why a transaction was skipped.
///
/// Rejections are not errors: the transaction is logged and skipped and
/// the rest of the block is applied normally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] PayloadError),
    #[error("insufficient funds: balance {balance}, amount {amount}")]
    InsufficientFunds { balance: Balance, amount: Balance },
    #[error("unknown action {0:?}")]
    UnknownAction(String),
}

impl Rejection {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::MalformedPayload(_) => "malformed_payload",
            Rejection::InsufficientFunds { .. } => "insufficient_funds",
            Rejection::UnknownAction(_) => "unknown_action",
        }
    }
}

/// Result of applying one transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied,
    Rejected(Rejection),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Handler for one action kind.
///
/// Implementations must be deterministic: every replica applying the same
/// transaction to the same state has to stage the same writes. All writes
/// of one transaction should go through a single
/// [`LedgerStore::put_batch`] so they become visible together. A rejected
/// transaction must not write anything.
pub trait ActionHandler: Send + Sync {
    /// Action tag this handler serves, lower-case.
    fn action(&self) -> &'static str;

    fn apply(
        &self,
        store: &mut dyn LedgerStore,
        tx: &FeedTransaction,
        envelope: &ActionEnvelope,
    ) -> Result<Outcome, StorageError>;
}

/// State-transition function from `(ledger, transaction)` to
/// `(ledger, outcome)`.
///
/// Side effects are confined to the store passed in. Storage failures are
/// returned as errors; everything else is an [`Outcome`].
pub struct TransactionApplier {
    handlers: HashMap<&'static str, Box<dyn ActionHandler>>,
}

impl TransactionApplier {
    /// An applier with no handlers; every action is unknown.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler`, replacing any handler for the same action.
    pub fn with_handler<H>(mut self, handler: H) -> Self
    where
        H: ActionHandler + 'static,
    {
        self.handlers.insert(handler.action(), Box::new(handler));
        self
    }

    pub fn apply(
        &self,
        store: &mut dyn LedgerStore,
        tx: &FeedTransaction,
    ) -> Result<Outcome, StorageError> {
        let envelope = match tx.envelope() {
            Ok(envelope) => envelope,
            Err(e) => return Ok(Outcome::Rejected(Rejection::MalformedPayload(e))),
        };

        let action = envelope.action.to_ascii_lowercase();
        match self.handlers.get(action.as_str()) {
            Some(handler) => handler.apply(store, tx, &envelope),
            None => Ok(Outcome::Rejected(Rejection::UnknownAction(envelope.action))),
        }
    }
}

impl Default for TransactionApplier {
    /// The applier every replica runs: `transfer` only.
    fn default() -> Self {
        Self::empty().with_handler(TransferHandler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ledger::{encode_balance, staged_balance};
    use crate::storage::MemoryLedgerStore;
    use crate::types::Address;

    fn tx(sender: &Address, payload: &str) -> FeedTransaction {
        FeedTransaction {
            sender: sender.to_string(),
            payload: payload.as_bytes().to_vec(),
            block_number: 1,
            sequence: 0,
            hash: None,
        }
    }

    /// Writes a marker key for every `marker` action.
    struct MarkerHandler;

    impl ActionHandler for MarkerHandler {
        fn action(&self) -> &'static str {
            "marker"
        }

        fn apply(
            &self,
            store: &mut dyn LedgerStore,
            tx: &FeedTransaction,
            _envelope: &ActionEnvelope,
        ) -> Result<Outcome, StorageError> {
            store.put(format!("marker/{}", tx.sequence).as_bytes(), vec![1])?;
            Ok(Outcome::Applied)
        }
    }

    #[test]
    fn unknown_action_is_rejected_without_mutation() {
        let mut store = MemoryLedgerStore::new();
        let applier = TransactionApplier::default();
        let before = store.digest().unwrap();

        let outcome = applier
            .apply(&mut store, &tx(&Address([1; 20]), r#"{"action":"stake","amount":"5"}"#))
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Rejected(Rejection::UnknownAction("stake".to_string()))
        );
        assert!(!store.has_uncommitted());
        assert_eq!(store.digest().unwrap(), before);
    }

    #[test]
    fn non_json_payload_is_malformed() {
        let mut store = MemoryLedgerStore::new();
        let outcome = TransactionApplier::default()
            .apply(&mut store, &tx(&Address([1; 20]), "transfer 5 to bob"))
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Rejected(Rejection::MalformedPayload(PayloadError::NotJson(_)))
        ));
        assert!(!store.has_uncommitted());
    }

    #[test]
    fn action_matching_is_case_insensitive() {
        let sender = Address([1; 20]);
        let receiver = Address([2; 20]);
        let mut store = MemoryLedgerStore::new();
        store
            .put(sender.as_bytes(), encode_balance(&Balance::from(10u32)))
            .unwrap();

        let payload = format!(r#"{{"action":"TRANSFER","amount":"4","receiver":"{receiver}"}}"#);
        let outcome = TransactionApplier::default()
            .apply(&mut store, &tx(&sender, &payload))
            .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(staged_balance(&store, &receiver).unwrap(), Balance::from(4u32));
    }

    #[test]
    fn registered_handler_extends_the_applier() {
        let mut store = MemoryLedgerStore::new();
        let applier = TransactionApplier::default().with_handler(MarkerHandler);

        let outcome = applier
            .apply(&mut store, &tx(&Address([1; 20]), r#"{"action":"marker"}"#))
            .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(store.get(b"marker/0").unwrap(), Some(vec![1]));
    }

    #[test]
    fn empty_applier_knows_no_actions() {
        let mut store = MemoryLedgerStore::new();
        let outcome = TransactionApplier::empty()
            .apply(
                &mut store,
                &tx(&Address([1; 20]), r#"{"action":"transfer","amount":"1","receiver":"0x00"}"#),
            )
            .unwrap();
        assert_eq!(outcome.clone(), Outcome::Rejected(Rejection::UnknownAction("transfer".into())));
        assert_eq!(
            match outcome {
                Outcome::Rejected(r) => r.kind(),
                Outcome::Applied => "applied",
            },
            "unknown_action"
        );
    }
}
