//! The concrete event payloads posted across the execution core, grounded
//! in `original_source/event/eventType.go`'s named event structs.

use crate::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A transaction was accepted into the pool's pending set.
    NewTx(Hash),
    /// The tx batcher flushed a batch of pending transactions ready for
    /// execution.
    ExecPendingTx(Vec<Hash>),
    /// A block passed validation and entered the block pool.
    NewBlock(Hash),
    /// The block batcher flushed a batch of valid blocks ready for
    /// execution.
    AppendBlock(Vec<Hash>),
    /// A block finished state-transition execution.
    ExecBlock(Hash),
    /// A block was committed as the new chain head.
    BlockCommit(Hash),
}
