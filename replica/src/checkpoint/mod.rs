//! Quorum-validated checkpoints and the abstractions around them.
//!
//! This module provides the replica's core state machine:
//!
//! - configuration parameters ([`config::CoordinatorConfig`],
//!   [`config::QuorumConfig`]),
//! - the storage seam ([`store::LedgerStore`], [`store::CommittedView`]),
//! - peer digest confirmation ([`quorum::QuorumValidator`] over a
//!   [`quorum::PeerRootHashClient`]),
//! - the per-block orchestrator ([`coordinator::CheckpointCoordinator`]).

pub mod config;
pub mod coordinator;
pub mod error;
pub mod quorum;
pub mod store;

pub use config::{CoordinatorConfig, EmptyRosterPolicy, QuorumConfig};
pub use coordinator::{
    BlockReport, CheckpointCoordinator, CoordinatorPhase, RevertReason, RoundOutcome,
};
pub use error::{CoordinatorError, InitError};
pub use quorum::{
    PeerRootHashClient, PeerRoster, QuorumDecision, QuorumTally, QuorumValidator,
    quorum_threshold,
};
pub use store::{CommittedView, LedgerStore};
