//! Transaction application for the replica ledger.
//!
//! This module turns delivered VIDA transactions into staged ledger writes.
//! It provides:
//!
//! - [`applier::TransactionApplier`]: dispatches a transaction to the
//!   [`applier::ActionHandler`] registered for its action tag,
//! - [`transfer::TransferHandler`]: the built-in `transfer` action,
//! - [`ledger`]: balance encoding and lookups over a store.

pub mod applier;
pub mod ledger;
pub mod transfer;

pub use applier::{ActionHandler, Outcome, Rejection, TransactionApplier};
pub use transfer::TransferHandler;
