//! Per-transaction execution receipts (§4.5).
//!
//! Grounded in `original_source/core/types/receipt.go`. A receipt is the
//! externally-visible outcome of applying one transaction: whether it
//! succeeded, how much gas it used, and the resulting state root.

use serde::{Deserialize, Serialize};

use crate::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: Hash,
    pub status: ReceiptStatus,
    pub gas_used: u64,
    /// State root immediately after this transaction was applied.
    pub post_state: Hash,
}

pub type Receipts = Vec<Receipt>;

/// Deterministic root over a block's receipts, used for `receipts_hash`.
pub fn receipts_root(receipts: &Receipts) -> Hash {
    crate::canonical::hash_of(receipts)
}
