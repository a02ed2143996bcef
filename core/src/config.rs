//! Runtime configuration for **Obscura** core.
//!
//! The [`Config`] struct centralises every tunable parameter the execution
//! core needs: bucket-tree shape, tx/block pool limits, batcher timing and
//! validator bounds. It is constructed via the [`ConfigBuilder`] fluent
//! builder, enabling callers to customise only the fields they care about
//! while keeping sensible defaults.
//!
//! All fields are `pub` so read-only access is ergonomic, however mutation
//! should occur through the builder to preserve validation invariants.
//!
//! ```
//! use obscura_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.bmt_capacity, 4);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime configuration shared across the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Number of buckets in a bucket-merkle-tree hash table. Must be a
    /// power of `bmt_aggregation`.
    pub bmt_capacity: usize,
    /// Fan-out of the merkle aggregation tree over buckets.
    pub bmt_aggregation: usize,

    /// Maximum number of transactions tracked by the pool (`all`).
    pub max_tx_pool_size: usize,
    /// Percent bump in `gas_limit` required to replace a tx at the same
    /// `(sender, nonce)`.
    pub price_bump: u64,
    /// Tx batcher: flush after this many promoted txs...
    pub tx_batch_capacity: usize,
    /// ...or after this much wall-clock time, whichever comes first.
    pub tx_batch_timeout: Duration,

    /// Maximum number of blocks tracked by the block pool.
    pub max_block_pool_size: usize,
    /// Block batcher: flush after this many valid blocks...
    pub block_batch_capacity: usize,
    /// ...or after this much wall-clock time, whichever comes first.
    pub block_batch_timeout: Duration,

    /// Maximum accepted clock drift for an incoming header's timestamp.
    pub max_timestamp_drift: Duration,
    /// How many blocks behind the current head a `parent_hash` may still
    /// reference and be accepted (shallow reorg tolerance).
    pub max_reorg_depth: u64,
    /// Maximum size in bytes of a header's `extra` field.
    pub max_extra_bytes: usize,
    /// Maximum serialized size of a single transaction's payload.
    pub max_tx_payload_bytes: usize,

    /// Human-readable name identifying the network (e.g. "main", "test").
    pub network: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bmt_capacity: 4,
            bmt_aggregation: 2,
            max_tx_pool_size: 10_000,
            price_bump: 10,
            tx_batch_capacity: 200,
            tx_batch_timeout: Duration::from_millis(200),
            max_block_pool_size: 1_024,
            block_batch_capacity: 16,
            block_batch_timeout: Duration::from_millis(200),
            max_timestamp_drift: Duration::from_secs(15),
            max_reorg_depth: 64,
            max_extra_bytes: 32,
            max_tx_payload_bytes: 64 * 1024,
            network: "main".into(),
        }
    }
}

impl Config {
    /// A configuration sized for production use: a large, sparsely filled
    /// bucket table instead of the tiny one used by tests (§4.1 defaults).
    pub fn production() -> Self {
        Self {
            bmt_capacity: 10_000,
            bmt_aggregation: 10,
            ..Self::default()
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self { inner: Config::default() }
    }

    pub fn bmt_capacity(mut self, cap: usize) -> Self {
        self.inner.bmt_capacity = cap;
        self
    }

    pub fn bmt_aggregation(mut self, aggregation: usize) -> Self {
        self.inner.bmt_aggregation = aggregation;
        self
    }

    pub fn max_tx_pool_size(mut self, size: usize) -> Self {
        self.inner.max_tx_pool_size = size;
        self
    }

    pub fn price_bump(mut self, bump: u64) -> Self {
        self.inner.price_bump = bump;
        self
    }

    pub fn tx_batch(mut self, capacity: usize, timeout: Duration) -> Self {
        self.inner.tx_batch_capacity = capacity;
        self.inner.tx_batch_timeout = timeout;
        self
    }

    pub fn max_block_pool_size(mut self, size: usize) -> Self {
        self.inner.max_block_pool_size = size;
        self
    }

    pub fn block_batch(mut self, capacity: usize, timeout: Duration) -> Self {
        self.inner.block_batch_capacity = capacity;
        self.inner.block_batch_timeout = timeout;
        self
    }

    pub fn max_reorg_depth(mut self, depth: u64) -> Self {
        self.inner.max_reorg_depth = depth;
        self
    }

    pub fn network<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.network = name.into();
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .bmt_capacity(16)
            .price_bump(25)
            .network("test")
            .finish();
        assert_eq!(cfg.bmt_capacity, 16);
        assert_eq!(cfg.price_bump, 25);
        assert_eq!(cfg.network, "test");
    }

    #[test]
    fn production_uses_larger_table() {
        let cfg = Config::production();
        assert_eq!(cfg.bmt_capacity, 10_000);
        assert_eq!(cfg.bmt_aggregation, 10);
    }
}
