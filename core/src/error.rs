//! Error types for the **Obscura** core crate.
//!
//! All high-level operations return [`crate::Result`] which is a convenient
//! alias for `core::result::Result<T, Error>`.
//!
//! The enum is intentionally flat: every error kind the execution core must
//! distinguish (bucket-tree, state, pool, validator, VM, event bus) gets its
//! own variant so callers can match on it instead of parsing strings.
//!
//! # Examples
//!
//! ```
//! use obscura_core::{Error, Result};
//!
//! fn demo_fn(fail: bool) -> Result<()> {
//!     if fail {
//!         Err(Error::PoolFull)
//!     } else {
//!         Ok(())
//!     }
//! }
//! ```

use thiserror::Error;

use crate::Hash;

/// Core crate error type.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    // --- BMT (§4.1, §7) ---
    /// A node or bucket whose hash is known but whose bytes are absent from
    /// the backing store. Fatal to the open tree; commit must abort rather
    /// than silently substitute an empty node (see SPEC_FULL.md §9).
    #[error("corrupted index: {kind} {hash} not found in store")]
    CorruptedIndex { kind: &'static str, hash: Hash },

    /// Generic key-value store miss; local to the caller, who decides
    /// (e.g. create an empty account).
    #[error("not found")]
    NotFound,

    /// Underlying KV-store I/O failure.
    #[error("store error: {0}")]
    Store(String),

    // --- Tx pool (§4.3, §7) ---
    #[error("transaction duplicate")]
    TxDuplicate,
    #[error("old transaction is better, discard the new one")]
    TxDiscard,
    #[error("tx pool is full")]
    PoolFull,
    #[error("oversized transaction payload")]
    TxTooLarge,
    #[error("negative or overflowing value")]
    NegativeValue,
    #[error("signature invalid")]
    SignInvalid,
    #[error("signature not found")]
    SignNotFound,
    #[error("public key not found")]
    PubkeyNotFound,
    #[error("sender address does not match public key")]
    AddressMismatch,

    // --- Block pool (§4.4, §7) ---
    #[error("block duplicate")]
    BlockDuplicate,
    #[error("block pool is full")]
    BlockPoolFull,
    #[error("invalid block header: {0}")]
    InvalidHeader(String),
    #[error("invalid block body: {0}")]
    InvalidBody(String),

    // --- State processor (§4.5, §7) ---
    #[error("nonce too high: expected {expected}, got {got}")]
    NonceTooHigh { expected: u64, got: u64 },
    #[error("nonce too low: expected {expected}, got {got}")]
    NonceTooLow { expected: u64, got: u64 },

    // --- VM (§6, §7) ---
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("out of gas")]
    OutOfGas,
    #[error("execution reverted: {0}")]
    ExecutionReverted(String),

    // --- Event bus (§4.6, §7) ---
    #[error("event bus closed")]
    MuxClosed,

    /// Escape hatch for errors originating from external collaborators
    /// (consensus engine, VM) that do not map onto a core kind.
    #[error("{0}")]
    Other(String),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
