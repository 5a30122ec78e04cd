//! In-memory, rewindable chain feed.
//!
//! Blocks are kept in an append-only log shared by all subscriptions. Each
//! subscription gets its own producer task that walks the log from the
//! subscription's cursor, sends the block's transactions and then its
//! progress signal, and parks when it reaches the end of the log.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, mpsc, watch};
use tracing::{debug, trace};

use super::{ChainBlock, ChainFeed, FeedCursor, FeedError, FeedEvent, FeedMessage, Subscription};

const CHANNEL_CAPACITY: usize = 256;

struct BlockLog {
    blocks: Mutex<BTreeMap<u64, ChainBlock>>,
    /// Bumped on every append so parked producers wake up.
    appended: watch::Sender<u64>,
}

impl BlockLog {
    fn first_from(&self, next: u64) -> Result<Option<ChainBlock>, FeedError> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| FeedError::LockPoisoned("block log"))?;
        Ok(blocks.range(next..).next().map(|(_, block)| block.clone()))
    }
}

/// Append-only block log implementing [`ChainFeed`].
#[derive(Clone)]
pub struct MemoryChainFeed {
    log: Arc<BlockLog>,
}

impl Default for MemoryChainFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChainFeed {
    pub fn new() -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            log: Arc::new(BlockLog {
                blocks: Mutex::new(BTreeMap::new()),
                appended,
            }),
        }
    }

    /// Builds a feed pre-loaded with `blocks`, which must be in increasing
    /// block order.
    pub fn from_blocks(blocks: impl IntoIterator<Item = ChainBlock>) -> Result<Self, FeedError> {
        let feed = Self::new();
        for block in blocks {
            feed.push_block(block)?;
        }
        Ok(feed)
    }

    /// Appends a block. Block numbers must strictly increase.
    pub fn push_block(&self, block: ChainBlock) -> Result<(), FeedError> {
        {
            let mut blocks = self
                .log
                .blocks
                .lock()
                .map_err(|_| FeedError::LockPoisoned("block log"))?;
            if let Some((&last, _)) = blocks.last_key_value() {
                if block.number <= last {
                    return Err(FeedError::OutOfOrder {
                        last,
                        got: block.number,
                    });
                }
            }
            debug!(
                block = block.number,
                txs = block.transactions.len(),
                "appended block to feed"
            );
            blocks.insert(block.number, block);
        }
        self.log.appended.send_modify(|version| *version += 1);
        Ok(())
    }

    /// Highest block in the log, if any.
    pub fn head(&self) -> Option<u64> {
        self.log
            .blocks
            .lock()
            .ok()
            .and_then(|blocks| blocks.last_key_value().map(|(&n, _)| n))
    }
}

impl ChainFeed for MemoryChainFeed {
    fn subscribe(&self, start_block: u64) -> Result<Subscription, FeedError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FeedError::NoRuntime)?;

        let cursor = Arc::new(MemoryCursor {
            position: Mutex::new(Position {
                generation: 0,
                next: start_block,
            }),
            rewound: Notify::new(),
        });
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        runtime.spawn(produce(self.log.clone(), cursor.clone(), tx));
        Ok(Subscription::new(rx, cursor))
    }
}

#[derive(Clone, Copy, Debug)]
struct Position {
    generation: u64,
    next: u64,
}

struct MemoryCursor {
    position: Mutex<Position>,
    rewound: Notify,
}

impl MemoryCursor {
    fn position(&self) -> Result<Position, FeedError> {
        self.position
            .lock()
            .map(|pos| *pos)
            .map_err(|_| FeedError::LockPoisoned("feed cursor"))
    }

    /// Moves past a fully delivered block unless a rewind happened meanwhile.
    fn advance(&self, generation: u64, next: u64) -> Result<(), FeedError> {
        let mut pos = self
            .position
            .lock()
            .map_err(|_| FeedError::LockPoisoned("feed cursor"))?;
        if pos.generation == generation {
            pos.next = next;
        }
        Ok(())
    }
}

impl FeedCursor for MemoryCursor {
    fn rewind(&self, last_processed: u64) -> Result<u64, FeedError> {
        let generation = {
            let mut pos = self
                .position
                .lock()
                .map_err(|_| FeedError::LockPoisoned("feed cursor"))?;
            pos.generation += 1;
            pos.next = last_processed + 1;
            pos.generation
        };
        debug!(last_processed, generation, "feed cursor rewound");
        self.rewound.notify_one();
        Ok(generation)
    }

    fn generation(&self) -> u64 {
        self.position
            .lock()
            .map(|pos| pos.generation)
            .unwrap_or_default()
    }
}

async fn produce(log: Arc<BlockLog>, cursor: Arc<MemoryCursor>, tx: mpsc::Sender<FeedMessage>) {
    let mut appended = log.appended.subscribe();

    loop {
        let Ok(Position { generation, next }) = cursor.position() else {
            return;
        };
        let block = match log.first_from(next) {
            Ok(block) => block,
            Err(_) => return,
        };

        let Some(block) = block else {
            tokio::select! {
                changed = appended.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = cursor.rewound.notified() => {}
                _ = tx.closed() => return,
            }
            continue;
        };

        trace!(block = block.number, generation, "delivering block");
        let number = block.number;
        for transaction in block.transactions {
            let message = FeedMessage {
                generation,
                event: FeedEvent::Transaction(transaction),
            };
            if tx.send(message).await.is_err() {
                return;
            }
        }
        let progress = FeedMessage {
            generation,
            event: FeedEvent::Progress(number),
        };
        if tx.send(progress).await.is_err() {
            return;
        }

        if cursor.advance(generation, number + 1).is_err() {
            return;
        }
    }
}
