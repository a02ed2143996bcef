//! Bucketed Merkle Tree: a fixed-capacity hash table of key/value slots,
//! aggregated into a merkle tree for a single root hash, content-addressed
//! in a [`KvStore`](crate::kv::KvStore).
//!
//! Grounded in `original_source/bmt/{tree.go,bucket.go,node.go,db.go}`.
//! Keys hash-bucket into one of `capacity` [`Bucket`]s (§4.1); buckets
//! aggregate upward in groups of `aggregation` until a single root remains.
//! Both buckets and internal nodes are stored content-addressed
//! (`"s"` + bucket hash, `"n"` + node hash), so two trees that happen to
//! agree on a subtree share its storage for free and a [`Tree::copy`]
//! needs only to clone the tree's own index bookkeeping, never bucket
//! contents.
//!
//! A read of a bucket or node whose hash is known but whose bytes are
//! missing from the store is always a hard [`Error::CorruptedIndex`] —
//! never silently treated as empty. An index that claims data exists but
//! the store disagrees is a storage invariant violation, not a miss.

mod bucket;
mod node;

pub use bucket::{bucket_index, Bucket};
pub use node::{MerkleNode, Position};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::kv::KvStore;
use crate::Hash;

const SLOT_PREFIX: u8 = b's';
const NODE_PREFIX: u8 = b'n';
const TABLE_PREFIX: u8 = b't';

fn slot_key(hash: &Hash) -> Vec<u8> {
    let mut k = vec![SLOT_PREFIX];
    k.extend_from_slice(&hash.0);
    k
}

fn node_key(hash: &Hash) -> Vec<u8> {
    let mut k = vec![NODE_PREFIX];
    k.extend_from_slice(&hash.0);
    k
}

fn table_key(hash: &Hash) -> Vec<u8> {
    let mut k = vec![TABLE_PREFIX];
    k.extend_from_slice(&hash.0);
    k
}

fn empty_bucket_hash() -> Hash {
    Bucket::new().hash()
}

/// Persisted snapshot of a tree's bucket-index (§6's `"t" || root_hash`
/// key): the full-length array of bucket hashes, in index order, absent
/// slots filled with the empty-bucket hash so the array's length always
/// equals `capacity`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct HashTableSnapshot {
    capacity: usize,
    bucket_hashes: Vec<Hash>,
}

/// A batch of key writes to apply to a [`Tree`] in one call to
/// [`Tree::process`]. `None` means delete.
#[derive(Debug, Clone, Default)]
pub struct WriteSet(BTreeMap<Vec<u8>, Option<Vec<u8>>>);

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.0.insert(key.into(), Some(value.into()));
        self
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.0.insert(key.into(), None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// A bucketed merkle tree opened against a content-addressed store.
///
/// Cheap to [`Tree::copy`]: the copy shares the underlying store and bucket
/// cache (both immutable/content-addressed) but gets its own index
/// bookkeeping, so writes to the copy never affect the original.
pub struct Tree {
    kv: Arc<dyn KvStore>,
    capacity: usize,
    aggregation: usize,
    /// bucket index -> current content hash. Absence means the bucket is
    /// conceptually empty and has never been materialized.
    bucket_hashes: Arc<RwLock<HashMap<usize, Hash>>>,
    /// content hash -> decoded bucket, a read-through cache shared across
    /// copies since entries are immutable once written.
    bucket_cache: Arc<RwLock<HashMap<Hash, Bucket>>>,
    /// position -> node, lazily populated as hashes are recomputed.
    nodes: Arc<RwLock<HashMap<Position, MerkleNode>>>,
    dirty_buckets: Arc<RwLock<HashSet<usize>>>,
    root: Arc<RwLock<Hash>>,
}

impl Tree {
    /// Opens a tree at `root` (pass [`Hash::ZERO`] for a fresh, empty
    /// tree). For a non-zero root this loads the bucket-index snapshot
    /// written by the last [`Tree::commit`] at that root; a root whose
    /// snapshot is missing from the store is a hard [`Error::CorruptedIndex`].
    pub fn open(kv: Arc<dyn KvStore>, capacity: usize, aggregation: usize, root: Hash) -> Result<Self> {
        let bucket_hashes = if root.is_zero() {
            HashMap::new()
        } else {
            let bytes = kv
                .get(&table_key(&root))?
                .ok_or(Error::CorruptedIndex { kind: "hashtable", hash: root })?;
            let snapshot: HashTableSnapshot =
                serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?;
            let empty = empty_bucket_hash();
            snapshot
                .bucket_hashes
                .into_iter()
                .enumerate()
                .filter(|(_, h)| *h != empty)
                .collect()
        };
        Ok(Tree {
            kv,
            capacity,
            aggregation,
            bucket_hashes: Arc::new(RwLock::new(bucket_hashes)),
            bucket_cache: Arc::new(RwLock::new(HashMap::new())),
            nodes: Arc::new(RwLock::new(HashMap::new())),
            dirty_buckets: Arc::new(RwLock::new(HashSet::new())),
            root: Arc::new(RwLock::new(root)),
        })
    }

    pub fn root(&self) -> Hash {
        *self.root.read()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn bucket_hash_at(&self, index: usize) -> Hash {
        self.bucket_hashes
            .read()
            .get(&index)
            .copied()
            .unwrap_or_else(empty_bucket_hash)
    }

    /// Loads (and caches) the bucket currently stored at `index`.
    /// `CorruptedIndex` if the index names a hash absent from the store.
    fn load_bucket(&self, index: usize) -> Result<Bucket> {
        let hash = self.bucket_hash_at(index);
        if hash == empty_bucket_hash() && !self.bucket_hashes.read().contains_key(&index) {
            return Ok(Bucket::new());
        }
        if let Some(b) = self.bucket_cache.read().get(&hash) {
            return Ok(b.clone());
        }
        let bytes = self
            .kv
            .get(&slot_key(&hash))?
            .ok_or(Error::CorruptedIndex { kind: "bucket", hash })?;
        let bucket: Bucket =
            serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?;
        self.bucket_cache.write().insert(hash, bucket.clone());
        Ok(bucket)
    }

    /// Looks up `key`'s value, following the bucket it hashes into.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let index = bucket_index(key, self.capacity);
        let bucket = self.load_bucket(index)?;
        Ok(bucket.get(key).cloned())
    }

    /// Applies a batch of key writes to their buckets, marking every
    /// touched bucket dirty. Does not recompute hashes or persist.
    pub fn process(&self, writes: &WriteSet) -> Result<()> {
        let mut touched: HashMap<usize, Bucket> = HashMap::new();
        for (key, value) in &writes.0 {
            let index = bucket_index(key, self.capacity);
            let bucket = match touched.get(&index) {
                Some(b) => b.clone(),
                None => self.load_bucket(index)?,
            };
            let mut bucket = bucket;
            match value {
                Some(v) => {
                    bucket.put(key.clone(), v.clone());
                }
                None => {
                    bucket.del(key);
                }
            }
            touched.insert(index, bucket);
        }
        let mut hashes = self.bucket_hashes.write();
        let mut cache = self.bucket_cache.write();
        let mut dirty = self.dirty_buckets.write();
        for (index, bucket) in touched {
            let h = bucket.hash();
            hashes.insert(index, h);
            cache.insert(h, bucket);
            dirty.insert(index);
        }
        Ok(())
    }

    fn num_levels(&self) -> u32 {
        let mut size = self.capacity;
        let mut levels = 1;
        while size > 1 {
            size = size.div_ceil(self.aggregation);
            levels += 1;
        }
        levels
    }

    fn level_size(&self, level: u32) -> usize {
        let mut size = self.capacity;
        for _ in 0..level {
            size = size.div_ceil(self.aggregation);
        }
        size
    }

    /// Recomputes hashes along every path from a dirty bucket to the root,
    /// without persisting anything. Returns the resulting root hash.
    pub fn prepare(&mut self) -> Result<Hash> {
        let dirty = self.dirty_buckets.read().clone();
        if dirty.is_empty() {
            return Ok(self.root());
        }

        let mut nodes = self.nodes.write();
        let mut frontier: HashSet<Position> =
            dirty.iter().map(|&i| Position::leaf(i)).collect();
        for &index in &dirty {
            let pos = Position::leaf(index);
            let hash = self.bucket_hash_at(index);
            nodes.insert(
                pos,
                MerkleNode {
                    position: pos,
                    hash,
                    children: Vec::new(),
                    dirty: false,
                },
            );
        }

        let num_levels = self.num_levels();
        for level in 0..num_levels.saturating_sub(1) {
            let mut next: HashSet<Position> = HashSet::new();
            let parents: HashSet<Position> = frontier
                .iter()
                .filter(|p| p.level == level)
                .map(|p| p.parent(self.aggregation))
                .collect();
            for parent in parents {
                let (start, end) = parent.child_range(self.aggregation);
                let level_len = self.level_size(level);
                let end = end.min(level_len);
                let mut children = Vec::with_capacity(end - start);
                for idx in start..end {
                    let child_pos = Position { level, index: idx };
                    let hash = if level == 0 {
                        self.bucket_hash_at(idx)
                    } else {
                        nodes
                            .get(&child_pos)
                            .map(|n| n.hash)
                            .unwrap_or_else(empty_bucket_hash)
                    };
                    children.push(hash);
                }
                let mut node = nodes.get(&parent).cloned().unwrap_or(MerkleNode {
                    position: parent,
                    hash: Hash::ZERO,
                    children: Vec::new(),
                    dirty: true,
                });
                node.recompute(children);
                nodes.insert(parent, node);
                next.insert(parent);
            }
            frontier = next;
        }

        let root_pos = Position {
            level: num_levels - 1,
            index: 0,
        };
        let root_hash = nodes
            .get(&root_pos)
            .map(|n| n.hash)
            .unwrap_or_else(|| self.bucket_hash_at(0));
        *self.root.write() = root_hash;
        Ok(root_hash)
    }

    /// Persists every bucket and node touched since the last commit, then
    /// clears dirty tracking. Returns the new root hash.
    pub fn commit(&mut self) -> Result<Hash> {
        let root = self.prepare()?;

        let dirty = {
            let mut d = self.dirty_buckets.write();
            std::mem::take(&mut *d)
        };
        if dirty.is_empty() {
            return Ok(root);
        }

        let mut batch = self.kv.new_batch();
        let cache = self.bucket_cache.read();
        for &index in &dirty {
            let hash = self.bucket_hash_at(index);
            if let Some(bucket) = cache.get(&hash) {
                let bytes =
                    serde_json::to_vec(bucket).map_err(|e| Error::Store(e.to_string()))?;
                batch.put(slot_key(&hash), bytes);
            }
        }
        drop(cache);

        let nodes = self.nodes.read();
        for node in nodes.values() {
            let bytes = serde_json::to_vec(node).map_err(|e| Error::Store(e.to_string()))?;
            batch.put(node_key(&node.hash), bytes);
        }
        drop(nodes);

        let snapshot = HashTableSnapshot {
            capacity: self.capacity,
            bucket_hashes: (0..self.capacity).map(|i| self.bucket_hash_at(i)).collect(),
        };
        let snapshot_bytes =
            serde_json::to_vec(&snapshot).map_err(|e| Error::Store(e.to_string()))?;
        batch.put(table_key(&root), snapshot_bytes);

        batch.write()?;
        Ok(root)
    }

    /// A copy-on-write snapshot: shares the content store and cache, but
    /// gets independent index bookkeeping, so subsequent writes to either
    /// tree are invisible to the other.
    pub fn copy(&self) -> Tree {
        Tree {
            kv: self.kv.clone(),
            capacity: self.capacity,
            aggregation: self.aggregation,
            bucket_hashes: Arc::new(RwLock::new(self.bucket_hashes.read().clone())),
            bucket_cache: self.bucket_cache.clone(),
            nodes: Arc::new(RwLock::new(self.nodes.read().clone())),
            dirty_buckets: Arc::new(RwLock::new(self.dirty_buckets.read().clone())),
            root: Arc::new(RwLock::new(self.root())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemKvStore;

    fn fresh(capacity: usize, aggregation: usize) -> Tree {
        Tree::open(Arc::new(MemKvStore::new()), capacity, aggregation, Hash::ZERO).unwrap()
    }

    #[test]
    fn empty_tree_has_no_value() {
        let tree = fresh(4, 2);
        assert_eq!(tree.get(b"asdf").unwrap(), None);
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut tree = fresh(4, 2);
        let mut ws = WriteSet::new();
        ws.put("test1", "asdffsdf");
        tree.process(&ws).unwrap();
        tree.commit().unwrap();
        assert_eq!(tree.get(b"test1").unwrap(), Some(b"asdffsdf".to_vec()));
    }

    #[test]
    fn root_is_deterministic_across_insertion_order() {
        let entries = [
            ("test1", "asdffsdf"),
            ("abcd", "test2asd"),
            ("lslsl", "test3f"),
            ("werw", "test12as"),
            ("ffff", "FDas"),
            ("asdf", "asdfff"),
        ];

        let mut t1 = fresh(4, 2);
        let mut ws1 = WriteSet::new();
        for (k, v) in entries {
            ws1.put(k, v);
        }
        t1.process(&ws1).unwrap();
        let root1 = t1.commit().unwrap();

        let mut t2 = fresh(4, 2);
        for (k, v) in entries.iter().rev() {
            let mut ws = WriteSet::new();
            ws.put(*k, *v);
            t2.process(&ws).unwrap();
        }
        let root2 = t2.commit().unwrap();

        assert_eq!(root1, root2);
    }

    #[test]
    fn copy_is_isolated_from_further_writes() {
        let mut tree = fresh(4, 2);
        let mut ws = WriteSet::new();
        ws.put("test1", "asdffsdf");
        tree.process(&ws).unwrap();
        tree.commit().unwrap();

        let mut snap = tree.copy();
        let mut ws2 = WriteSet::new();
        ws2.put("test1", "changed");
        tree.process(&ws2).unwrap();
        tree.commit().unwrap();

        assert_eq!(tree.get(b"test1").unwrap(), Some(b"changed".to_vec()));
        assert_eq!(snap.get(b"test1").unwrap(), Some(b"asdffsdf".to_vec()));
        assert_ne!(tree.root(), snap.prepare().unwrap());
    }

    #[test]
    fn reading_a_corrupted_index_is_a_hard_error() {
        let kv = Arc::new(MemKvStore::new());
        let mut tree = Tree::open(kv.clone(), 4, 2, Hash::ZERO).unwrap();
        let mut ws = WriteSet::new();
        ws.put("k", "v");
        tree.process(&ws).unwrap();
        let root = tree.commit().unwrap();

        // Corrupt the store by wiping every persisted slot.
        for (k, _) in kv.iterate(b"s").unwrap() {
            kv.delete(&k).unwrap();
        }

        let reopened = Tree::open(kv, 4, 2, root).unwrap();
        let err = reopened.get(b"k").unwrap_err();
        assert!(matches!(err, Error::CorruptedIndex { kind: "bucket", .. }));
    }

    #[test]
    fn reopening_at_committed_root_reads_back_persisted_values() {
        let kv = Arc::new(MemKvStore::new());
        let mut tree = Tree::open(kv.clone(), 4, 2, Hash::ZERO).unwrap();
        let mut ws = WriteSet::new();
        ws.put("test1", "asdffsdf");
        ws.put("abcd", "test2asd");
        tree.process(&ws).unwrap();
        let root = tree.commit().unwrap();

        let reopened = Tree::open(kv, 4, 2, root).unwrap();
        assert_eq!(reopened.root(), root);
        assert_eq!(reopened.get(b"test1").unwrap(), Some(b"asdffsdf".to_vec()));
        assert_eq!(reopened.get(b"abcd").unwrap(), Some(b"test2asd".to_vec()));
        assert_eq!(reopened.get(b"missing").unwrap(), None);
    }

    #[test]
    fn opening_an_unknown_root_is_a_hard_error() {
        let kv = Arc::new(MemKvStore::new());
        let err = Tree::open(kv, 4, 2, Hash::from_slice(&[9; 32])).unwrap_err();
        assert!(matches!(err, Error::CorruptedIndex { kind: "hashtable", .. }));
    }
}
