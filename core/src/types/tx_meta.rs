//! A transaction's location within the canonical chain, keyed by its
//! hash (§6's `"l"` lookup entries).

use serde::{Deserialize, Serialize};

use crate::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMeta {
    pub block_hash: Hash,
    pub height: u64,
    pub tx_index: u32,
}
