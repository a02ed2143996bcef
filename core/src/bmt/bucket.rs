//! A single hash bucket: a small sorted slot table plus its own hash.
//!
//! Mirrors `original_source/bmt/bucket.go`'s `Bucket{H, Slots, Keys}`. Slots
//! are keyed by the hex encoding of the raw slot key rather than the raw
//! bytes themselves — `serde_json`'s map serializer requires string keys,
//! and hex encoding preserves byte-wise ordering, so the canonical
//! lexicographic-by-key rule (§6) still falls out of the `BTreeMap`'s
//! natural order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::hash_of;
use crate::Hash;

/// One bucket of a [`super::HashTable`]: an unordered key space folded into
/// a bounded, ordered slot map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bucket {
    pub slots: BTreeMap<String, Vec<u8>>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.slots.get(&hex::encode(key))
    }

    /// Inserts or overwrites a slot, returning the previous value if any.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        self.slots.insert(hex::encode(&key), value)
    }

    pub fn del(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.slots.remove(&hex::encode(key))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Deterministic content hash, over the canonical (key-sorted)
    /// serialization of the bucket's slots.
    pub fn hash(&self) -> Hash {
        hash_of(self)
    }
}

/// Maps an arbitrary key to a bucket index in `[0, capacity)`.
///
/// Ground truth: `original_source/bmt/bucket.go`'s `getIndex`, which reduces
/// the key's first four bytes (big-endian, zero-padded if the key is
/// shorter) modulo the table capacity. No hashing is involved.
pub fn bucket_index(key: &[u8], capacity: usize) -> usize {
    debug_assert!(capacity > 0, "bucket table capacity must be non-zero");
    let mut buf = [0u8; 4];
    let n = key.len().min(4);
    buf[..n].copy_from_slice(&key[..n]);
    (u32::from_be_bytes(buf) as usize) % capacity
}
