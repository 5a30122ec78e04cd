//! The built-in `transfer` action.

use crate::checkpoint::store::LedgerStore;
use crate::storage::StorageError;
use crate::types::{ActionEnvelope, FeedTransaction, TransferPayload};

use super::applier::{ActionHandler, Outcome, Rejection};
use super::ledger::{encode_balance, staged_balance};

/// Moves `amount` from the transaction sender to `receiver`.
///
/// Debit and credit are staged with one [`LedgerStore::put_batch`] call, so
/// a transfer is either fully visible or not at all. Accounts are created on
/// first credit and never removed.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransferHandler;

impl ActionHandler for TransferHandler {
    fn action(&self) -> &'static str {
        "transfer"
    }

    fn apply(
        &self,
        store: &mut dyn LedgerStore,
        tx: &FeedTransaction,
        envelope: &ActionEnvelope,
    ) -> Result<Outcome, StorageError> {
        let transfer = match TransferPayload::from_envelope(envelope) {
            Ok(transfer) => transfer,
            Err(e) => return Ok(Outcome::Rejected(e.into())),
        };
        let sender = match tx.sender_address() {
            Ok(sender) => sender,
            Err(e) => return Ok(Outcome::Rejected(e.into())),
        };

        let sender_balance = staged_balance(store, &sender)?;
        if sender_balance < transfer.amount {
            return Ok(Outcome::Rejected(Rejection::InsufficientFunds {
                balance: sender_balance,
                amount: transfer.amount,
            }));
        }

        if sender == transfer.receiver {
            store.put_batch(vec![(
                sender.as_bytes().to_vec(),
                encode_balance(&sender_balance),
            )])?;
            return Ok(Outcome::Applied);
        }

        let receiver_balance = staged_balance(store, &transfer.receiver)?;
        let debited = &sender_balance - &transfer.amount;
        let credited = receiver_balance + &transfer.amount;

        store.put_batch(vec![
            (sender.as_bytes().to_vec(), encode_balance(&debited)),
            (
                transfer.receiver.as_bytes().to_vec(),
                encode_balance(&credited),
            ),
        ])?;

        Ok(Outcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::TransactionApplier;
    use crate::storage::MemoryLedgerStore;
    use crate::types::{Address, Balance, PayloadError};
    use num::ToPrimitive;

    const ALICE: Address = Address([0xa1; 20]);
    const BOB: Address = Address([0xb0; 20]);
    const CAROL: Address = Address([0xc0; 20]);

    fn funded(allocations: &[(Address, u64)]) -> MemoryLedgerStore {
        let mut store = MemoryLedgerStore::new();
        for (addr, amount) in allocations {
            store
                .put(addr.as_bytes(), encode_balance(&Balance::from(*amount)))
                .unwrap();
        }
        store.commit(None).unwrap();
        store
    }

    fn transfer(from: &Address, to: &Address, amount: &str) -> FeedTransaction {
        FeedTransaction {
            sender: from.to_string(),
            payload: format!(r#"{{"action":"transfer","amount":"{amount}","receiver":"{to}"}}"#)
                .into_bytes(),
            block_number: 10,
            sequence: 0,
            hash: None,
        }
    }

    fn balance(store: &MemoryLedgerStore, addr: &Address) -> u64 {
        staged_balance(store, addr).unwrap().to_u64().unwrap()
    }

    #[test]
    fn transfer_debits_sender_and_credits_receiver() {
        let mut store = funded(&[(ALICE, 100)]);
        let outcome = TransactionApplier::default()
            .apply(&mut store, &transfer(&ALICE, &BOB, "30"))
            .unwrap();

        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(balance(&store, &ALICE), 70);
        assert_eq!(balance(&store, &BOB), 30);
    }

    #[test]
    fn insufficient_funds_leaves_ledger_untouched() {
        let mut store = funded(&[(ALICE, 10)]);
        let before = store.digest().unwrap();

        let outcome = TransactionApplier::default()
            .apply(&mut store, &transfer(&ALICE, &BOB, "50"))
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Rejected(Rejection::InsufficientFunds {
                balance: Balance::from(10u32),
                amount: Balance::from(50u32),
            })
        );
        assert!(!store.has_uncommitted());
        assert_eq!(store.digest().unwrap(), before);
        assert_eq!(balance(&store, &ALICE), 10);
    }

    #[test]
    fn exact_balance_can_be_spent_to_zero() {
        let mut store = funded(&[(ALICE, 25)]);
        let outcome = TransactionApplier::default()
            .apply(&mut store, &transfer(&ALICE, &BOB, "25"))
            .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(balance(&store, &ALICE), 0);
        assert_eq!(balance(&store, &BOB), 25);
    }

    #[test]
    fn total_supply_is_conserved_over_a_sequence() {
        let mut store = funded(&[(ALICE, 100), (BOB, 50)]);
        let applier = TransactionApplier::default();

        let txs = [
            transfer(&ALICE, &BOB, "30"),
            transfer(&BOB, &CAROL, "70"),
            transfer(&CAROL, &ALICE, "500"),
            transfer(&CAROL, &CAROL, "10"),
            transfer(&ALICE, &CAROL, "0"),
        ];
        for tx in &txs {
            applier.apply(&mut store, tx).unwrap();
        }

        let total: u64 = [ALICE, BOB, CAROL]
            .iter()
            .map(|addr| balance(&store, addr))
            .sum();
        assert_eq!(total, 150);
        assert_eq!(balance(&store, &ALICE), 70);
        assert_eq!(balance(&store, &BOB), 10);
        assert_eq!(balance(&store, &CAROL), 70);
    }

    #[test]
    fn self_transfer_is_applied_without_net_change() {
        let mut store = funded(&[(ALICE, 40)]);
        let outcome = TransactionApplier::default()
            .apply(&mut store, &transfer(&ALICE, &ALICE, "15"))
            .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(balance(&store, &ALICE), 40);
    }

    #[test]
    fn self_transfer_still_needs_funds() {
        let mut store = funded(&[(ALICE, 5)]);
        let outcome = TransactionApplier::default()
            .apply(&mut store, &transfer(&ALICE, &ALICE, "6"))
            .unwrap();

        assert!(matches!(
            outcome,
            Outcome::Rejected(Rejection::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn malformed_sender_is_rejected() {
        let mut store = funded(&[(ALICE, 100)]);
        let mut tx = transfer(&ALICE, &BOB, "1");
        tx.sender = "not-an-address".to_string();

        let outcome = TransactionApplier::default().apply(&mut store, &tx).unwrap();

        assert!(matches!(
            outcome,
            Outcome::Rejected(Rejection::MalformedPayload(PayloadError::InvalidSender(_)))
        ));
        assert!(!store.has_uncommitted());
    }

    #[test]
    fn malformed_receiver_is_rejected() {
        let mut store = funded(&[(ALICE, 100)]);
        let tx = FeedTransaction {
            payload: br#"{"action":"transfer","amount":"1","receiver":"0x1234"}"#.to_vec(),
            ..transfer(&ALICE, &BOB, "1")
        };

        let outcome = TransactionApplier::default().apply(&mut store, &tx).unwrap();

        assert!(matches!(
            outcome,
            Outcome::Rejected(Rejection::MalformedPayload(PayloadError::InvalidReceiver(_)))
        ));
        assert_eq!(balance(&store, &ALICE), 100);
    }
}
