//! The block pool: a height-indexed cache of validated-but-not-yet-applied
//! blocks (§4.7), grounded in `original_source/executor/blockpool/
//! block_pool.go`.
//!
//! A block is admitted once its header links correctly to its stated
//! parent and its body matches its header's `tx_root`. Admitted blocks
//! feed a [`Batcher`] exactly like the tx pool's promotions, flushing
//! `AppendBlock` events once enough have arrived or enough time has
//! passed. [`BlockPool::commit`] removes a height once the chain head
//! manager has applied it, keeping the pool's memory bounded to the
//! shallow window of not-yet-applied blocks.

mod validator;

pub use validator::{BlockValidator, DefaultBlockValidator};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::batcher::Batcher;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{Event, EventBus};
use crate::types::{Block, BlockHeader};
use crate::Hash;

pub struct BlockPool {
    config: Config,
    validator: Arc<dyn BlockValidator>,
    valid: RwLock<HashMap<u64, Block>>,
    promote_tx: mpsc::Sender<Hash>,
}

impl BlockPool {
    pub fn new(config: Config, validator: Arc<dyn BlockValidator>) -> (Arc<BlockPool>, Batcher<Hash>) {
        let (batcher, promote_tx) =
            Batcher::new(config.block_batch_capacity, config.block_batch_timeout);
        let pool = Arc::new(BlockPool {
            config,
            validator,
            valid: RwLock::new(HashMap::new()),
            promote_tx,
        });
        (pool, batcher)
    }

    pub fn len(&self) -> usize {
        self.valid.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, height: u64) -> Option<Block> {
        self.valid.read().get(&height).cloned()
    }

    /// Validates `block` against `parent` and admits it if it passes.
    pub async fn add(&self, block: Block, parent: &BlockHeader) -> Result<()> {
        if self.valid.read().contains_key(&block.height()) {
            return Err(Error::BlockDuplicate);
        }
        self.validator
            .validate_header(&block.header, parent, &self.config)?;
        self.validator.validate_body(&block)?;
        if self.valid.read().len() >= self.config.max_block_pool_size {
            return Err(Error::BlockPoolFull);
        }

        let hash = block.hash();
        let height = block.height();
        self.valid.write().insert(height, block);
        debug!(height, %hash, "block admitted");

        let _ = self.promote_tx.send(hash).await;
        Ok(())
    }

    /// Removes `height` from the pool once the chain head manager has
    /// applied it (§4.9's `BlockCommit`).
    pub fn commit(&self, height: u64) -> Option<Block> {
        self.valid.write().remove(&height)
    }
}

/// Drives `batcher`'s flushed hash batches onto `bus` as
/// [`Event::AppendBlock`]. Intended to be `tokio::spawn`ed alongside a
/// [`BlockPool`].
pub async fn run_batcher(batcher: Batcher<Hash>, bus: EventBus<Event>) {
    batcher
        .run(|batch| {
            let bus = bus.clone();
            async move {
                let _ = bus.post(Event::AppendBlock(batch)).await;
            }
        })
        .await;
}
