//! Canonical on-chain data types: transactions, blocks and receipts.

mod block;
mod receipt;
mod transaction;
mod tx_meta;

pub use block::{tx_root, Block, BlockHeader};
pub use receipt::{receipts_root, Receipt, ReceiptStatus, Receipts};
pub use transaction::{Transaction, TxData};
pub use tx_meta::TxMeta;
