//! Canonical serialization and hashing (§6).
//!
//! "Canonical" means: field names in declaration order, maps ordered
//! lexicographically by key, big integers as decimal strings, byte arrays
//! as `0x`-prefixed hex strings. `serde_json` (without the `preserve_order`
//! feature) already sorts map/object keys lexicographically and serde's
//! derive preserves struct field declaration order, so canonical bytes are
//! simply this crate's JSON encoding — no bespoke writer needed.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::Hash;

/// Serializes `value` to its canonical byte form.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("canonical serialization is infallible for core types")
}

/// `H = SHA-256` over the canonical serialization of `value` (§6).
pub fn hash_of<T: Serialize>(value: &T) -> Hash {
    let bytes = to_canonical_bytes(value);
    sha256(&bytes)
}

/// Raw SHA-256 over arbitrary bytes.
pub fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    Hash::from_slice(&digest)
}
