//! Aggregation-tree node addressing and hashing.
//!
//! Ground truth: `original_source/bmt/node.go`'s `Position{Level,Index}` and
//! `MerkleNode{H, Pos, Children, dirty}`. Level 0 holds one node per bucket
//! (the leaves); each level above aggregates `aggregation` children from the
//! level below into one node, until a single root remains.

use serde::{Deserialize, Serialize};

use crate::canonical::hash_of;
use crate::Hash;

/// Address of a node within the aggregation tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub level: u32,
    pub index: usize,
}

impl Position {
    pub fn leaf(index: usize) -> Self {
        Position { level: 0, index }
    }

    pub fn parent(&self, aggregation: usize) -> Position {
        Position {
            level: self.level + 1,
            index: self.index / aggregation,
        }
    }

    /// Index range `[start, end)` of this node's children at `level - 1`.
    pub fn child_range(&self, aggregation: usize) -> (usize, usize) {
        let start = self.index * aggregation;
        (start, start + aggregation)
    }
}

/// One node of the aggregation tree: its position, cached hash and dirty
/// flag. `children` holds the hashes this node was last computed from, used
/// to detect whether recomputation is actually necessary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleNode {
    pub position: Position,
    pub hash: Hash,
    pub children: Vec<Hash>,
    #[serde(skip)]
    pub dirty: bool,
}

impl MerkleNode {
    pub fn leaf(index: usize, bucket_hash: Hash) -> Self {
        MerkleNode {
            position: Position::leaf(index),
            hash: bucket_hash,
            children: Vec::new(),
            dirty: true,
        }
    }

    /// Recomputes this node's hash from its children's hashes and clears
    /// the dirty flag. Internal nodes hash the canonical list of child
    /// hashes; this is a no-op (hash already set) for leaves, whose hash is
    /// their bucket's hash.
    pub fn recompute(&mut self, children: Vec<Hash>) {
        self.hash = hash_of(&children);
        self.children = children;
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_aggregates_expected_child_range() {
        let pos = Position { level: 1, index: 2 };
        assert_eq!(pos.child_range(3), (6, 9));
        assert_eq!(pos.parent(3), Position { level: 2, index: 0 });
    }

    #[test]
    fn recompute_is_deterministic_over_child_order() {
        let mut n = MerkleNode {
            position: Position { level: 1, index: 0 },
            hash: Hash::ZERO,
            children: Vec::new(),
            dirty: true,
        };
        let kids = vec![Hash::from_slice(&[1; 32]), Hash::from_slice(&[2; 32])];
        n.recompute(kids.clone());
        assert!(!n.dirty);
        let expected = hash_of(&kids);
        assert_eq!(n.hash, expected);
    }
}
