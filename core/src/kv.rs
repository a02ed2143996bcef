//! Opaque ordered key-value store facade (C1, §6).
//!
//! The execution core never assumes a physical layout: it only needs
//! `put`/`get`/`delete`, prefix iteration and atomic batched writes. This
//! mirrors `original_source/db/interface.go`'s `Database`/`Batch`/`Iterator`
//! trio. Two implementations ship here: [`MemKvStore`], an in-memory
//! `BTreeMap` used by tests and as the default, and (behind the
//! `sled-store` feature) a `sled`-backed store for real persistence — the
//! pack's common embedded-KV choice (see `other_examples` manifests).

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// An atomic group of writes. All puts/deletes in a batch become visible
/// together (or not at all) once `write()` returns.
pub trait Batch: Send {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);
    fn delete(&mut self, key: Vec<u8>);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn write(self: Box<Self>) -> Result<()>;
}

/// Ordered byte-key store with batched writes and prefix iteration.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&self, key: &[u8]) -> Result<()>;
    /// All key-value pairs whose key starts with `prefix`, in ascending
    /// key order.
    fn iterate(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
    fn new_batch(&self) -> Box<dyn Batch>;
}

/// In-memory, `BTreeMap`-backed [`KvStore`]. Ordered iteration falls out of
/// `BTreeMap`'s key ordering for free.
#[derive(Clone, Default)]
pub struct MemKvStore {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemBatch {
    store: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    ops: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl Batch for MemBatch {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push((key, Some(value)));
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.ops.push((key, None));
    }

    fn len(&self) -> usize {
        self.ops.len()
    }

    fn write(self: Box<Self>) -> Result<()> {
        let mut guard = self.store.write();
        for (key, value) in self.ops {
            match value {
                Some(v) => {
                    guard.insert(key, v);
                }
                None => {
                    guard.remove(&key);
                }
            }
        }
        Ok(())
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.write().remove(key);
        Ok(())
    }

    fn iterate(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .inner
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn new_batch(&self) -> Box<dyn Batch> {
        Box::new(MemBatch {
            store: self.inner.clone(),
            ops: Vec::new(),
        })
    }
}

#[cfg(feature = "sled-store")]
mod sled_store {
    use super::*;

    /// `sled`-backed [`KvStore`] for real on-disk persistence.
    #[derive(Clone)]
    pub struct SledKvStore {
        db: sled::Db,
    }

    impl SledKvStore {
        pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
            let db = sled::open(path).map_err(|e| Error::Store(e.to_string()))?;
            Ok(Self { db })
        }
    }

    struct SledBatch {
        db: sled::Db,
        batch: sled::Batch,
        len: usize,
    }

    impl Batch for SledBatch {
        fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
            self.batch.insert(key, value);
            self.len += 1;
        }

        fn delete(&mut self, key: Vec<u8>) {
            self.batch.remove(key);
            self.len += 1;
        }

        fn len(&self) -> usize {
            self.len
        }

        fn write(self: Box<Self>) -> Result<()> {
            self.db
                .apply_batch(self.batch)
                .map_err(|e| Error::Store(e.to_string()))?;
            self.db.flush().map_err(|e| Error::Store(e.to_string()))?;
            Ok(())
        }
    }

    impl KvStore for SledKvStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            self.db
                .get(key)
                .map(|opt| opt.map(|v| v.to_vec()))
                .map_err(|e| Error::Store(e.to_string()))
        }

        fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
            self.db
                .insert(key, value)
                .map(|_| ())
                .map_err(|e| Error::Store(e.to_string()))
        }

        fn delete(&self, key: &[u8]) -> Result<()> {
            self.db
                .remove(key)
                .map(|_| ())
                .map_err(|e| Error::Store(e.to_string()))
        }

        fn iterate(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
            self.db
                .scan_prefix(prefix)
                .map(|res| {
                    res.map(|(k, v)| (k.to_vec(), v.to_vec()))
                        .map_err(|e| Error::Store(e.to_string()))
                })
                .collect()
        }

        fn new_batch(&self) -> Box<dyn Batch> {
            Box::new(SledBatch {
                db: self.db.clone(),
                batch: sled::Batch::default(),
                len: 0,
            })
        }
    }
}

#[cfg(feature = "sled-store")]
pub use sled_store::SledKvStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_round_trip() {
        let store = MemKvStore::new();
        store.put(b"k1", b"v1").unwrap();
        assert_eq!(store.get(b"k1").unwrap(), Some(b"v1".to_vec()));
        store.delete(b"k1").unwrap();
        assert_eq!(store.get(b"k1").unwrap(), None);
    }

    #[test]
    fn prefix_iteration_is_ordered() {
        let store = MemKvStore::new();
        store.put(b"s/b", b"2").unwrap();
        store.put(b"s/a", b"1").unwrap();
        store.put(b"t/z", b"9").unwrap();
        let got = store.iterate(b"s/").unwrap();
        assert_eq!(
            got,
            vec![(b"s/a".to_vec(), b"1".to_vec()), (b"s/b".to_vec(), b"2".to_vec())]
        );
    }

    #[test]
    fn batch_write_is_atomic_from_callers_view() {
        let store = MemKvStore::new();
        let mut batch = store.new_batch();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        assert_eq!(store.get(b"a").unwrap(), None);
        batch.write().unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    }
}
