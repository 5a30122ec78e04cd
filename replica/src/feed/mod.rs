//! Ordered source of base-chain transactions and block-progress signals.
//!
//! A feed delivers, for every block, the block's VIDA transactions followed
//! by a progress signal for that block. Every message carries the
//! generation of the subscription it was produced under; rewinding the
//! cursor starts a new generation, so consumers can discard messages that
//! were already in flight when they rewound.
//!
//! - [`memory::MemoryChainFeed`]: append-only in-memory block log,
//! - [`file::load_blocks`]: reads a block log from a JSON file.

pub mod file;
pub mod memory;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::types::FeedTransaction;

pub use file::{load_blocks, parse_blocks};
pub use memory::MemoryChainFeed;

/// Errors raised by feed implementations.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to read block file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid block file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("block {got} does not follow block {last}")]
    OutOfOrder { last: u64, got: u64 },
    #[error("feed subscriptions need a running tokio runtime")]
    NoRuntime,
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

/// One base-chain block as carried by a feed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainBlock {
    pub number: u64,
    pub transactions: Vec<FeedTransaction>,
}

impl ChainBlock {
    pub fn new(number: u64) -> Self {
        Self {
            number,
            transactions: Vec::new(),
        }
    }

    /// Appends a transaction, stamping it with this block's number and the
    /// next sequence index. Indices stop at `u32::MAX`; transactions past
    /// that point share it.
    pub fn with_transaction(
        mut self,
        sender: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        hash: Option<String>,
    ) -> Self {
        let sequence = sequence_index(self.transactions.len());
        self.transactions.push(FeedTransaction {
            sender: sender.into(),
            payload: payload.into(),
            block_number: self.number,
            sequence,
            hash,
        });
        self
    }
}

fn sequence_index(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    Transaction(FeedTransaction),
    /// Every transaction of this block has been delivered.
    Progress(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedMessage {
    pub generation: u64,
    pub event: FeedEvent,
}

/// Handle used to move a subscription's delivery position.
pub trait FeedCursor: Send + Sync {
    /// Marks `last_processed` as the last block handled by the consumer.
    ///
    /// Delivery resumes with block `last_processed + 1`. Returns the new
    /// generation; messages stamped with an older one must be discarded.
    fn rewind(&self, last_processed: u64) -> Result<u64, FeedError>;

    /// Current generation of the subscription.
    fn generation(&self) -> u64;
}

/// A live subscription: an ordered message channel plus its cursor.
pub struct Subscription {
    events: mpsc::Receiver<FeedMessage>,
    cursor: Arc<dyn FeedCursor>,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<FeedMessage>, cursor: Arc<dyn FeedCursor>) -> Self {
        Self { events, cursor }
    }

    /// Waits for the next message. `None` once the feed has shut down.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        self.events.recv().await
    }

    pub fn cursor(&self) -> Arc<dyn FeedCursor> {
        self.cursor.clone()
    }
}

/// Source of ordered VIDA transactions.
pub trait ChainFeed {
    /// Starts delivery at `start_block`.
    fn subscribe(&self, start_block: u64) -> Result<Subscription, FeedError>;
}
