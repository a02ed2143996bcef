//! O(1) cross-sender duplicate-hash tracking for the pool, split out from
//! per-sender [`super::tx_list::TxList`]s so a duplicate submission can be
//! rejected without scanning every sender's list.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::Hash;

#[derive(Default)]
pub struct TxLookup {
    hashes: RwLock<HashSet<Hash>>,
}

impl TxLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.hashes.read().contains(hash)
    }

    /// Returns `true` if `hash` was newly inserted (not already tracked).
    pub fn insert(&self, hash: Hash) -> bool {
        self.hashes.write().insert(hash)
    }

    pub fn remove(&self, hash: &Hash) -> bool {
        self.hashes.write().remove(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_whether_hash_was_new() {
        let lookup = TxLookup::new();
        let h = Hash::from_slice(&[1; 32]);
        assert!(lookup.insert(h));
        assert!(!lookup.insert(h));
        assert!(lookup.contains(&h));
        assert!(lookup.remove(&h));
        assert!(!lookup.contains(&h));
    }
}
