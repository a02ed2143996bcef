//! Chain head manager: tracks the current tip and caches recently-seen
//! blocks and headers (§4.9).
//!
//! Grounded in `original_source/core/blockchain.go` and `original_source/
//! db/db.go`'s key layout. The head manager is deliberately the only place
//! that mutates "what is canonical" — the block pool only holds
//! candidates, and this module is what promotes one to the head and tells
//! the world (`BlockCommit`) once persisted.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::info;

use crate::canonical::to_canonical_bytes;
use crate::error::{Error, Result};
use crate::event::{Event, EventBus};
use crate::kv::KvStore;
use crate::types::{Block, BlockHeader, Receipts, TxMeta};
use crate::Hash;

const LAST_HEADER_KEY: &[u8] = b"LastHeader";
const LAST_BLOCK_KEY: &[u8] = b"LastBlock";
const WORLD_STATE_KEY: &[u8] = b"WorldState";

const HASH_BY_HEIGHT_PREFIX: u8 = b'h';
const HEIGHT_BY_HASH_PREFIX: u8 = b'H';
const BLOCK_PREFIX: u8 = b'b';
const RECEIPTS_PREFIX: u8 = b'r';
const TX_META_PREFIX: u8 = b'l';

/// `"h" || decimal(height) || "n"` — the canonical hash at `height`.
fn hash_by_height_key(height: u64) -> Vec<u8> {
    let mut k = vec![HASH_BY_HEIGHT_PREFIX];
    k.extend_from_slice(height.to_string().as_bytes());
    k.push(b'n');
    k
}

/// `"h" || decimal(height) || hash` — the header at `(height, hash)`.
fn header_key(height: u64, hash: &Hash) -> Vec<u8> {
    let mut k = vec![HASH_BY_HEIGHT_PREFIX];
    k.extend_from_slice(height.to_string().as_bytes());
    k.extend_from_slice(&hash.0);
    k
}

/// `"H" || hash` — the height a block hash was committed at.
fn height_by_hash_key(hash: &Hash) -> Vec<u8> {
    let mut k = vec![HEIGHT_BY_HASH_PREFIX];
    k.extend_from_slice(&hash.0);
    k
}

/// `"b" || decimal(height) || hash` — the full block at `(height, hash)`.
fn block_key(height: u64, hash: &Hash) -> Vec<u8> {
    let mut k = vec![BLOCK_PREFIX];
    k.extend_from_slice(height.to_string().as_bytes());
    k.extend_from_slice(&hash.0);
    k
}

/// `"r" || decimal(height) || hash` — the receipts list for `(height, hash)`.
fn receipts_key(height: u64, hash: &Hash) -> Vec<u8> {
    let mut k = vec![RECEIPTS_PREFIX];
    k.extend_from_slice(height.to_string().as_bytes());
    k.extend_from_slice(&hash.0);
    k
}

/// `"l" || tx_hash` — where a transaction landed.
fn tx_meta_key(tx_hash: &Hash) -> Vec<u8> {
    let mut k = vec![TX_META_PREFIX];
    k.extend_from_slice(&tx_hash.0);
    k
}

pub struct Chain {
    kv: Arc<dyn KvStore>,
    bus: EventBus<Event>,
    head: Mutex<Option<BlockHeader>>,
    blocks: Mutex<LruCache<Hash, Arc<Block>>>,
    headers: Mutex<LruCache<Hash, BlockHeader>>,
}

impl Chain {
    pub fn open(kv: Arc<dyn KvStore>, bus: EventBus<Event>, cache_size: usize) -> Result<Self> {
        let cap = std::num::NonZeroUsize::new(cache_size.max(1)).unwrap();
        let head = match kv.get(LAST_HEADER_KEY)? {
            Some(bytes) => Some(
                serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Chain {
            kv,
            bus,
            head: Mutex::new(head),
            blocks: Mutex::new(LruCache::new(cap)),
            headers: Mutex::new(LruCache::new(cap)),
        })
    }

    pub fn head(&self) -> Option<BlockHeader> {
        self.head.lock().clone()
    }

    pub fn height(&self) -> u64 {
        self.head().map(|h| h.height).unwrap_or(0)
    }

    pub fn state_root(&self) -> Result<Option<Hash>> {
        match self.kv.get(WORLD_STATE_KEY)? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Looks up the canonical hash committed at `height`, if any.
    pub fn hash_at_height(&self, height: u64) -> Result<Option<Hash>> {
        match self.kv.get(&hash_by_height_key(height))? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Looks up the height a committed block hash landed at.
    pub fn height_of(&self, hash: &Hash) -> Result<Option<u64>> {
        match self.kv.get(&height_by_hash_key(hash))? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn get_header(&self, hash: &Hash) -> Result<Option<BlockHeader>> {
        if let Some(h) = self.headers.lock().get(hash) {
            return Ok(Some(h.clone()));
        }
        let height = match self.height_of(hash)? {
            Some(h) => h,
            None => return Ok(None),
        };
        match self.kv.get(&header_key(height, hash))? {
            Some(bytes) => {
                let header: BlockHeader =
                    serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?;
                self.headers.lock().put(*hash, header.clone());
                Ok(Some(header))
            }
            None => Ok(None),
        }
    }

    pub fn get_block(&self, hash: &Hash) -> Result<Option<Arc<Block>>> {
        if let Some(b) = self.blocks.lock().get(hash) {
            return Ok(Some(b.clone()));
        }
        let height = match self.height_of(hash)? {
            Some(h) => h,
            None => return Ok(None),
        };
        match self.kv.get(&block_key(height, hash))? {
            Some(bytes) => {
                let block: Block =
                    serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?;
                let block = Arc::new(block);
                self.blocks.lock().put(*hash, block.clone());
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    /// Looks up the receipts produced by applying the block at `hash`.
    pub fn get_receipts(&self, hash: &Hash) -> Result<Option<Receipts>> {
        let height = match self.height_of(hash)? {
            Some(h) => h,
            None => return Ok(None),
        };
        match self.kv.get(&receipts_key(height, hash))? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Looks up where `tx_hash` landed, if it was ever committed.
    pub fn get_tx_meta(&self, tx_hash: &Hash) -> Result<Option<TxMeta>> {
        match self.kv.get(&tx_meta_key(tx_hash))? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Commits `block` as the new chain head: persists its header, body,
    /// receipts and per-tx lookup entries, advances every index, and posts
    /// `BlockCommit`.
    pub async fn commit(&self, block: Block, receipts: Receipts, state_root: Hash) -> Result<()> {
        let hash = block.hash();
        let height = block.height();
        let header_bytes = to_canonical_bytes(&block.header);
        let block_bytes = to_canonical_bytes(&block);

        let mut batch = self.kv.new_batch();
        batch.put(LAST_HEADER_KEY.to_vec(), header_bytes.clone());
        batch.put(LAST_BLOCK_KEY.to_vec(), block_bytes.clone());
        batch.put(WORLD_STATE_KEY.to_vec(), to_canonical_bytes(&state_root));
        batch.put(hash_by_height_key(height), to_canonical_bytes(&hash));
        batch.put(header_key(height, &hash), header_bytes);
        batch.put(height_by_hash_key(&hash), to_canonical_bytes(&height));
        batch.put(block_key(height, &hash), block_bytes);
        batch.put(receipts_key(height, &hash), to_canonical_bytes(&receipts));
        for (index, tx) in block.transactions.iter().enumerate() {
            let meta = TxMeta {
                block_hash: hash,
                height,
                tx_index: index as u32,
            };
            batch.put(tx_meta_key(&tx.hash()), to_canonical_bytes(&meta));
        }
        batch.write()?;

        self.headers.lock().put(hash, block.header.clone());
        self.blocks.lock().put(hash, Arc::new(block.clone()));
        *self.head.lock() = Some(block.header.clone());

        info!(height, %hash, "block committed");
        let _ = self.bus.post(Event::BlockCommit(hash)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Receipt, ReceiptStatus};
    use crate::Address;

    fn header(height: u64, parent_hash: Hash) -> BlockHeader {
        BlockHeader {
            parent_hash,
            height,
            timestamp: height,
            coinbase: Address::ZERO,
            state_root: Hash::ZERO,
            tx_root: crate::types::tx_root(&[]),
            receipts_hash: Hash::ZERO,
            gas_limit: 8_000_000,
            gas_used: 0,
            extra: Vec::new(),
        }
    }

    #[tokio::test]
    async fn fresh_chain_has_no_head() {
        let chain = Chain::open(Arc::new(crate::kv::MemKvStore::new()), EventBus::new(), 16).unwrap();
        assert!(chain.head().is_none());
        assert_eq!(chain.height(), 0);
    }

    #[tokio::test]
    async fn commit_advances_head_and_persists() {
        let kv = Arc::new(crate::kv::MemKvStore::new());
        let chain = Chain::open(kv.clone(), EventBus::new(), 16).unwrap();
        let block = Block::new(header(1, Hash::ZERO), Vec::new());
        let hash = block.hash();
        chain.commit(block, Vec::new(), Hash::from_slice(&[9; 32])).await.unwrap();

        assert_eq!(chain.height(), 1);
        assert_eq!(chain.head().unwrap().hash(), hash);
        assert_eq!(chain.state_root().unwrap(), Some(Hash::from_slice(&[9; 32])));

        let reopened = Chain::open(kv, EventBus::new(), 16).unwrap();
        assert_eq!(reopened.head().unwrap().hash(), hash);
    }

    #[tokio::test]
    async fn committed_block_and_header_are_retrievable_by_hash() {
        let chain = Chain::open(Arc::new(crate::kv::MemKvStore::new()), EventBus::new(), 16).unwrap();
        let block = Block::new(header(1, Hash::ZERO), Vec::new());
        let hash = block.hash();
        chain.commit(block, Vec::new(), Hash::ZERO).await.unwrap();

        assert_eq!(chain.get_header(&hash).unwrap().unwrap().height, 1);
        assert_eq!(chain.get_block(&hash).unwrap().unwrap().hash(), hash);
        assert_eq!(chain.hash_at_height(1).unwrap(), Some(hash));
        assert_eq!(chain.height_of(&hash).unwrap(), Some(1));
    }

    #[tokio::test]
    async fn committed_receipts_are_retrievable() {
        let chain = Chain::open(Arc::new(crate::kv::MemKvStore::new()), EventBus::new(), 16).unwrap();
        let block = Block::new(header(1, Hash::ZERO), Vec::new());
        let hash = block.hash();
        let receipts = vec![Receipt {
            tx_hash: Hash::from_slice(&[5; 32]),
            status: ReceiptStatus::Success,
            gas_used: 21_000,
            post_state: Hash::ZERO,
        }];
        chain.commit(block, receipts.clone(), Hash::ZERO).await.unwrap();

        assert_eq!(chain.get_receipts(&hash).unwrap(), Some(receipts));
    }

    #[tokio::test]
    async fn committed_tx_lands_a_lookup_entry() {
        use crate::types::{Transaction, TxData};
        use crate::Amount;

        let chain = Chain::open(Arc::new(crate::kv::MemKvStore::new()), EventBus::new(), 16).unwrap();
        let tx = Transaction::new_unsigned(TxData {
            nonce: 0,
            gas_limit: 21_000,
            value: Amount::from_u64(1),
            from: Address::ZERO,
            to: Some(Address::from_slice(&[9; 20])),
            payload: Vec::new(),
        });
        let tx_hash = tx.hash();
        let block = Block::new(header(1, Hash::ZERO), vec![tx]);
        let block_hash = block.hash();
        chain.commit(block, Vec::new(), Hash::ZERO).await.unwrap();

        let meta = chain.get_tx_meta(&tx_hash).unwrap().unwrap();
        assert_eq!(meta.block_hash, block_hash);
        assert_eq!(meta.height, 1);
        assert_eq!(meta.tx_index, 0);
    }

    #[tokio::test]
    async fn commit_posts_block_commit_event() {
        let chain = Chain::open(Arc::new(crate::kv::MemKvStore::new()), EventBus::new(), 16).unwrap();
        let mut sub = chain.bus.subscribe();
        let block = Block::new(header(1, Hash::ZERO), Vec::new());
        let hash = block.hash();
        chain.commit(block, Vec::new(), Hash::ZERO).await.unwrap();
        assert_eq!(sub.recv().await, Some(Event::BlockCommit(hash)));
    }
}
