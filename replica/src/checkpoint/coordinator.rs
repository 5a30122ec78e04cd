//! Per-block apply / validate / commit-or-revert orchestration.
//!
//! The coordinator wires together:
//!
//! - a [`LedgerStore`] holding staged and committed balances,
//! - a [`TransactionApplier`] turning transactions into staged writes,
//! - a [`QuorumValidator`] confirming digests against peer replicas,
//! - the cursor of a chain feed subscription, rewound on failed rounds.
//!
//! Transactions are buffered as they arrive. A block-progress signal runs
//! one round: apply the buffered transactions of that block, compute the
//! digest, ask the peers, then either commit the staged writes together
//! with a checkpoint or discard them and rewind the feed to the last
//! committed block. Every round starts from the last committed state, so
//! redelivered transactions are never applied twice.

use std::future::Future;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::execution::{Outcome, Rejection, TransactionApplier};
use crate::feed::{FeedCursor, FeedEvent, FeedMessage, Subscription};
use crate::genesis::{GenesisConfig, apply_genesis};
use crate::metrics::CheckpointMetrics;
use crate::storage::StorageError;
use crate::types::{Checkpoint, FeedTransaction, StateDigest};

use super::config::CoordinatorConfig;
use super::error::CoordinatorError;
use super::quorum::{PeerRootHashClient, PeerRoster, QuorumDecision, QuorumTally, QuorumValidator};
use super::store::LedgerStore;

/// Where the coordinator is in its round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorPhase {
    /// Waiting for block progress; transactions are buffered.
    Idle,
    Applying,
    Validating,
    Committed,
    Reverting,
}

/// Per-block transaction counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockReport {
    pub applied: usize,
    pub rejected: usize,
}

/// Why a round's staged writes were discarded.
#[derive(Debug)]
pub enum RevertReason {
    /// Peers did not confirm the digest.
    Quorum(QuorumTally),
    /// The store failed while applying, hashing or committing.
    Storage(StorageError),
}

impl RevertReason {
    fn label(&self) -> &'static str {
        match self {
            RevertReason::Quorum(_) => "quorum",
            RevertReason::Storage(_) => "storage",
        }
    }
}

/// What a block-progress signal led to.
#[derive(Debug)]
pub enum RoundOutcome {
    Committed {
        checkpoint: Checkpoint,
        tally: QuorumTally,
        report: BlockReport,
    },
    Reverted {
        block_number: u64,
        /// Block the feed was rewound to; delivery resumes after it.
        rewound_to: u64,
        reason: RevertReason,
    },
    /// Progress for a block that is already committed.
    Skipped { block_number: u64 },
}

/// Drives the checkpoint state machine for one replica.
///
/// Generic over:
///
/// - `S`: storage backend implementing [`LedgerStore`],
/// - `C`: peer client implementing [`PeerRootHashClient`].
pub struct CheckpointCoordinator<S, C> {
    config: CoordinatorConfig,
    store: S,
    applier: TransactionApplier,
    validator: QuorumValidator<C>,
    roster: PeerRoster,
    phase: CoordinatorPhase,
    buffer: Vec<FeedTransaction>,
    last_committed: u64,
    generation: u64,
    metrics: Option<CheckpointMetrics>,
}

impl<S, C> CheckpointCoordinator<S, C>
where
    S: LedgerStore,
    C: PeerRootHashClient,
{
    /// Creates a coordinator positioned after the store's latest checkpoint,
    /// or just before `config.start_block` if there is none.
    pub fn new(
        config: CoordinatorConfig,
        store: S,
        applier: TransactionApplier,
        validator: QuorumValidator<C>,
        roster: PeerRoster,
    ) -> Result<Self, StorageError> {
        let last_committed = match store.committed_view().latest_checkpoint()? {
            Some(cp) => cp.block_number,
            None => config.start_block.saturating_sub(1),
        };
        info!(
            last_committed,
            peers = roster.len(),
            "checkpoint coordinator ready"
        );

        Ok(Self {
            config,
            store,
            applier,
            validator,
            roster,
            phase: CoordinatorPhase::Idle,
            buffer: Vec::new(),
            last_committed,
            generation: 0,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: CheckpointMetrics) -> Self {
        metrics.last_committed_block.set(block_gauge(self.last_committed));
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns a reference to the underlying ledger store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn phase(&self) -> CoordinatorPhase {
        self.phase
    }

    /// Block number of the latest committed checkpoint, or the block before
    /// the configured start block when nothing was committed yet.
    pub fn last_committed(&self) -> u64 {
        self.last_committed
    }

    /// First block the feed should deliver.
    pub fn next_block(&self) -> u64 {
        self.last_committed + 1
    }

    /// Number of transactions waiting for their block's progress signal.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Seeds a never-used ledger with `genesis`; see
    /// [`crate::genesis::apply_genesis`]. Returns whether anything was written.
    pub fn apply_genesis(&mut self, genesis: &GenesisConfig) -> Result<bool, StorageError> {
        apply_genesis(&mut self.store, genesis)
    }

    /// Buffers a delivered transaction.
    pub fn on_transaction(&mut self, tx: FeedTransaction) {
        if tx.block_number <= self.last_committed {
            warn!(
                block = tx.block_number,
                seq = tx.sequence,
                last_committed = self.last_committed,
                "dropping transaction for already committed block"
            );
            return;
        }
        self.buffer.push(tx);
    }

    /// Runs one round for `block_number`.
    pub async fn on_block_progress(
        &mut self,
        block_number: u64,
        cursor: &dyn FeedCursor,
    ) -> Result<RoundOutcome, CoordinatorError> {
        if block_number <= self.last_committed {
            debug!(
                block = block_number,
                last_committed = self.last_committed,
                "ignoring progress for committed block"
            );
            return Ok(RoundOutcome::Skipped { block_number });
        }

        let started = Instant::now();
        self.phase = CoordinatorPhase::Applying;

        let report = match self.apply_ready(block_number) {
            Ok(report) => report,
            Err(e) => return self.revert(block_number, RevertReason::Storage(e), cursor),
        };

        let digest = match self.store.digest() {
            Ok(digest) => digest,
            Err(e) => return self.revert(block_number, RevertReason::Storage(e), cursor),
        };

        self.phase = CoordinatorPhase::Validating;
        debug!(block = block_number, %digest, "validating digest");
        let decision = self
            .validator
            .validate(&digest, block_number, &self.roster)
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.round_seconds.observe(started.elapsed().as_secs_f64());
        }

        match decision {
            QuorumDecision::Commit(tally) => self.commit(block_number, digest, tally, report, cursor),
            QuorumDecision::Reject(tally) => {
                self.revert(block_number, RevertReason::Quorum(tally), cursor)
            }
        }
    }

    /// Applies buffered transactions up to and including `block_number`, in
    /// delivery order. Later transactions stay buffered.
    fn apply_ready(&mut self, block_number: u64) -> Result<BlockReport, StorageError> {
        let (ready, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.buffer)
            .into_iter()
            .partition(|tx| tx.block_number <= block_number);
        self.buffer = later;

        let mut report = BlockReport::default();
        for tx in &ready {
            match self.applier.apply(&mut self.store, tx)? {
                Outcome::Applied => {
                    report.applied += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.transactions_applied.inc();
                    }
                }
                Outcome::Rejected(reason) => {
                    report.rejected += 1;
                    self.log_rejection(tx, &reason);
                }
            }
        }
        Ok(report)
    }

    fn log_rejection(&self, tx: &FeedTransaction, reason: &Rejection) {
        warn!(
            block = tx.block_number,
            seq = tx.sequence,
            sender = %tx.sender,
            %reason,
            "transaction rejected"
        );
        if let Some(metrics) = &self.metrics {
            metrics
                .transactions_rejected
                .with_label_values(&[reason.kind()])
                .inc();
        }
    }

    fn commit(
        &mut self,
        block_number: u64,
        digest: StateDigest,
        tally: QuorumTally,
        report: BlockReport,
        cursor: &dyn FeedCursor,
    ) -> Result<RoundOutcome, CoordinatorError> {
        let checkpoint = Checkpoint::pending(block_number, digest).commit();
        if let Err(e) = self.store.commit(Some(&checkpoint)) {
            return self.revert(block_number, RevertReason::Storage(e), cursor);
        }

        self.phase = CoordinatorPhase::Committed;
        self.last_committed = block_number;
        if let Some(metrics) = &self.metrics {
            metrics.rounds_committed.inc();
            metrics.last_committed_block.set(block_gauge(block_number));
        }
        info!(
            block = block_number,
            digest = %checkpoint.digest,
            applied = report.applied,
            rejected = report.rejected,
            matches = tally.matches,
            alive = tally.alive,
            "checkpoint committed"
        );

        self.phase = CoordinatorPhase::Idle;
        Ok(RoundOutcome::Committed {
            checkpoint,
            tally,
            report,
        })
    }

    fn revert(
        &mut self,
        block_number: u64,
        reason: RevertReason,
        cursor: &dyn FeedCursor,
    ) -> Result<RoundOutcome, CoordinatorError> {
        self.phase = CoordinatorPhase::Reverting;
        match &reason {
            RevertReason::Quorum(tally) => warn!(
                block = block_number,
                matches = tally.matches,
                alive = tally.alive,
                threshold = tally.threshold(),
                "quorum failed; reverting to last checkpoint"
            ),
            RevertReason::Storage(e) => warn!(
                block = block_number,
                error = %e,
                "storage failure; reverting to last checkpoint"
            ),
        }

        self.store
            .revert_uncommitted()
            .map_err(CoordinatorError::Revert)?;
        self.buffer.clear();
        self.generation = cursor.rewind(self.last_committed)?;

        if let Some(metrics) = &self.metrics {
            metrics
                .rounds_reverted
                .with_label_values(&[reason.label()])
                .inc();
        }

        self.phase = CoordinatorPhase::Idle;
        Ok(RoundOutcome::Reverted {
            block_number,
            rewound_to: self.last_committed,
            reason,
        })
    }

    /// Handles one feed message, discarding those from before the latest
    /// rewind.
    pub async fn handle(
        &mut self,
        message: FeedMessage,
        cursor: &dyn FeedCursor,
    ) -> Result<Option<RoundOutcome>, CoordinatorError> {
        if message.generation < self.generation {
            debug!(
                generation = message.generation,
                current = self.generation,
                "discarding stale feed message"
            );
            return Ok(None);
        }
        if message.generation > self.generation {
            // Someone else rewound the cursor; whatever is buffered will be
            // delivered again.
            self.generation = message.generation;
            self.buffer.clear();
        }

        match message.event {
            FeedEvent::Transaction(tx) => {
                self.on_transaction(tx);
                Ok(None)
            }
            FeedEvent::Progress(block_number) => {
                self.on_block_progress(block_number, cursor).await.map(Some)
            }
        }
    }

    /// Consumes `subscription` until `shutdown` resolves or the feed closes.
    pub async fn run<F>(
        &mut self,
        mut subscription: Subscription,
        shutdown: F,
    ) -> Result<(), CoordinatorError>
    where
        F: Future<Output = ()>,
    {
        let cursor = subscription.cursor();
        self.generation = cursor.generation();
        let mut shutdown = std::pin::pin!(shutdown);

        info!(next_block = self.next_block(), "checkpoint coordinator running");
        loop {
            let message = tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested; stopping coordinator");
                    break;
                }
                message = subscription.recv() => message,
            };

            let Some(message) = message else {
                warn!("chain feed closed; stopping coordinator");
                break;
            };
            let outcome = self.handle(message, cursor.as_ref()).await?;

            if matches!(outcome, Some(RoundOutcome::Reverted { .. }))
                && !self.config.retry_delay.is_zero()
            {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("shutdown requested; stopping coordinator");
                        break;
                    }
                    _ = tokio::time::sleep(self.config.retry_delay) => {}
                }
            }
        }
        Ok(())
    }

    /// Discards staged writes and closes the store.
    pub fn shutdown(&mut self) -> Result<(), CoordinatorError> {
        self.buffer.clear();
        self.store
            .revert_uncommitted()
            .map_err(CoordinatorError::Revert)?;
        self.store.close().map_err(CoordinatorError::Close)?;
        info!(last_committed = self.last_committed, "ledger store closed");
        Ok(())
    }
}

/// Block heights past `i64::MAX` pin the gauge at its maximum.
fn block_gauge(block_number: u64) -> i64 {
    i64::try_from(block_number).unwrap_or(i64::MAX)
}
