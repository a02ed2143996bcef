//! Pluggable block-acceptance policy, grounded in
//! `original_source/consensus/consensus.go`. The execution core only
//! needs a yes/no verifier at block admission time; selecting or running
//! an actual consensus protocol (PoW mining, DPoS round-robin, ...) is out
//! of scope here and left to a concrete [`Engine`].

use crate::error::Result;
use crate::types::{Block, BlockHeader};

pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    /// Header-only verification, run before a block's body is even
    /// fetched.
    fn verify_header(&self, header: &BlockHeader, parent: &BlockHeader) -> Result<()>;

    /// Full verification once the body is available.
    fn verify_block(&self, block: &Block, parent: &BlockHeader) -> Result<()>;
}

/// A pass-through engine that accepts anything the block pool's own
/// header/body validators already admitted. Useful for tests and for
/// networks that delegate all consensus to something outside this crate.
#[derive(Default)]
pub struct NullEngine;

impl Engine for NullEngine {
    fn name(&self) -> &str {
        "null"
    }

    fn verify_header(&self, _header: &BlockHeader, _parent: &BlockHeader) -> Result<()> {
        Ok(())
    }

    fn verify_block(&self, _block: &Block, _parent: &BlockHeader) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, Hash};

    #[test]
    fn null_engine_accepts_everything() {
        let parent = BlockHeader {
            parent_hash: Hash::ZERO,
            height: 0,
            timestamp: 0,
            coinbase: Address::ZERO,
            state_root: Hash::ZERO,
            tx_root: Hash::ZERO,
            receipts_hash: Hash::ZERO,
            gas_limit: 0,
            gas_used: 0,
            extra: Vec::new(),
        };
        let engine = NullEngine;
        engine.verify_header(&parent, &parent).unwrap();
        let block = Block::new(parent.clone(), Vec::new());
        engine.verify_block(&block, &parent).unwrap();
    }
}
