//! Contract code storage: an LRU cache in front of the KV store.
//!
//! Grounded in `original_source/core/state/db.go`'s `CodeStore`
//! (`KeyContractCode = "c"`). Code is content-addressed by its own hash, so
//! the store never needs an explicit delete path: unreferenced code simply
//! ages out of the LRU and is never looked up again.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::canonical::sha256;
use crate::error::{Error, Result};
use crate::kv::KvStore;
use crate::Hash;

const CODE_PREFIX: u8 = b'c';

fn code_key(hash: &Hash) -> Vec<u8> {
    let mut k = vec![CODE_PREFIX];
    k.extend_from_slice(&hash.0);
    k
}

pub struct CodeStore {
    kv: Arc<dyn KvStore>,
    cache: Mutex<lru::LruCache<Hash, Arc<Vec<u8>>>>,
}

impl CodeStore {
    pub fn new(kv: Arc<dyn KvStore>, cache_size: usize) -> Self {
        let cap = std::num::NonZeroUsize::new(cache_size.max(1)).unwrap();
        CodeStore {
            kv,
            cache: Mutex::new(lru::LruCache::new(cap)),
        }
    }

    /// Hashes and stores `code`, returning its content hash. A no-op write
    /// if the code is already present.
    pub fn put(&self, code: Vec<u8>) -> Result<Hash> {
        let hash = sha256(&code);
        let code = Arc::new(code);
        self.cache.lock().put(hash, code.clone());
        self.kv.put(&code_key(&hash), &code)?;
        Ok(hash)
    }

    /// Fetches code by its hash. `Hash::ZERO` (the no-code marker) always
    /// resolves to an empty vector without touching the store.
    pub fn get(&self, hash: &Hash) -> Result<Arc<Vec<u8>>> {
        if hash.is_zero() {
            return Ok(Arc::new(Vec::new()));
        }
        if let Some(code) = self.cache.lock().get(hash) {
            return Ok(code.clone());
        }
        let bytes = self
            .kv
            .get(&code_key(hash))?
            .ok_or(Error::CorruptedIndex { kind: "code", hash: *hash })?;
        let code = Arc::new(bytes);
        self.cache.lock().put(*hash, code.clone());
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemKvStore;

    #[test]
    fn put_then_get_round_trips() {
        let store = CodeStore::new(Arc::new(MemKvStore::new()), 4);
        let hash = store.put(b"contract bytecode".to_vec()).unwrap();
        assert_eq!(*store.get(&hash).unwrap(), b"contract bytecode".to_vec());
    }

    #[test]
    fn zero_hash_is_empty_code_without_a_lookup() {
        let store = CodeStore::new(Arc::new(MemKvStore::new()), 4);
        assert_eq!(*store.get(&Hash::ZERO).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn missing_code_is_a_hard_error() {
        let store = CodeStore::new(Arc::new(MemKvStore::new()), 4);
        let err = store.get(&Hash::from_slice(&[7; 32])).unwrap_err();
        assert!(matches!(err, Error::CorruptedIndex { kind: "code", .. }));
    }
}
