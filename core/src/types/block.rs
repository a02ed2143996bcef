//! Blocks and headers (§4.4).
//!
//! Grounded in `original_source/core/types/block.go`. A block's identity is
//! its header hash: the body (transactions) is committed to only through
//! `tx_root`, so two blocks with the same header are the same block even
//! if transaction ordering metadata differs.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::canonical::hash_of;
use crate::types::transaction::Transaction;
use crate::{Address, Hash};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    pub parent_hash: Hash,
    pub height: u64,
    pub timestamp: u64,
    pub coinbase: Address,
    pub state_root: Hash,
    pub tx_root: Hash,
    pub receipts_hash: Hash,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub extra: Vec<u8>,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        hash_of(self)
    }
}

/// Deterministic root over a block's transaction hashes (not the full
/// transaction bodies, which may carry non-canonical signature metadata).
pub fn tx_root(transactions: &[Transaction]) -> Hash {
    let hashes: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();
    hash_of(&hashes)
}

#[derive(Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    #[serde(skip)]
    hash: OnceLock<Hash>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Block {
            header,
            transactions,
            hash: OnceLock::new(),
        }
    }

    /// A block's hash is its header's hash, memoized.
    pub fn hash(&self) -> Hash {
        *self.hash.get_or_init(|| self.header.hash())
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }
}

impl Clone for Block {
    fn clone(&self) -> Self {
        Block {
            header: self.header.clone(),
            transactions: self.transactions.clone(),
            hash: self.hash.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(height: u64) -> BlockHeader {
        BlockHeader {
            parent_hash: Hash::ZERO,
            height,
            timestamp: 0,
            coinbase: Address::ZERO,
            state_root: Hash::ZERO,
            tx_root: Hash::ZERO,
            receipts_hash: Hash::ZERO,
            gas_limit: 8_000_000,
            gas_used: 0,
            extra: Vec::new(),
        }
    }

    #[test]
    fn hash_is_memoized_and_height_sensitive() {
        let b1 = Block::new(header(1), Vec::new());
        let b2 = Block::new(header(2), Vec::new());
        assert_eq!(b1.hash(), b1.hash());
        assert_ne!(b1.hash(), b2.hash());
    }

    #[test]
    fn empty_tx_root_is_stable() {
        assert_eq!(tx_root(&[]), tx_root(&[]));
    }
}
