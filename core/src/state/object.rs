//! A single account's live, mutable view: its [`Account`] fields, code and
//! per-slot storage tree, each guarded by a cache/dirty overlay so reads
//! are cheap and writes only touch the underlying [`Tree`] on commit.
//!
//! Grounded in `original_source/core/state/state_obj.go`'s `stateObject`
//! (`cacheStorage`/`dirtyStorage` maps, lazy `Root()`/`Commit()`).

use std::collections::HashMap;
use std::sync::Arc;

use crate::bmt::{Tree, WriteSet};
use crate::error::Result;
use crate::state::account::Account;
use crate::state::code_store::CodeStore;
use crate::{Address, Amount, Hash};

pub struct StateObject {
    pub address: Address,
    account: Account,
    /// Account fields as they were when this object was loaded, used only
    /// to decide whether a flush to the parent DB is needed.
    original: Account,
    code: Option<Arc<Vec<u8>>>,
    storage: Tree,
    cache_storage: HashMap<Vec<u8>, Vec<u8>>,
    dirty_storage: HashMap<Vec<u8>, Option<Vec<u8>>>,
    account_dirty: bool,
}

impl StateObject {
    pub fn new(address: Address, account: Account, storage: Tree) -> Self {
        StateObject {
            address,
            account,
            original: account,
            code: None,
            storage,
            cache_storage: HashMap::new(),
            dirty_storage: HashMap::new(),
            account_dirty: false,
        }
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn nonce(&self) -> u64 {
        self.account.nonce
    }

    pub fn balance(&self) -> Amount {
        self.account.balance
    }

    pub fn code_hash(&self) -> Hash {
        self.account.code_hash
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.account.nonce = nonce;
        self.account_dirty = true;
    }

    pub fn set_balance(&mut self, balance: Amount) {
        self.account.balance = balance;
        self.account_dirty = true;
    }

    pub fn add_balance(&mut self, amount: Amount) -> Option<()> {
        self.account.balance = self.account.balance.checked_add(amount)?;
        self.account_dirty = true;
        Some(())
    }

    pub fn sub_balance(&mut self, amount: Amount) -> Option<()> {
        self.account.balance = self.account.balance.checked_sub(amount)?;
        self.account_dirty = true;
        Some(())
    }

    pub fn code(&mut self, store: &CodeStore) -> Result<Arc<Vec<u8>>> {
        if let Some(code) = &self.code {
            return Ok(code.clone());
        }
        let code = store.get(&self.account.code_hash)?;
        self.code = Some(code.clone());
        Ok(code)
    }

    pub fn set_code(&mut self, store: &CodeStore, code: Vec<u8>) -> Result<()> {
        let hash = store.put(code.clone())?;
        self.account.code_hash = hash;
        self.code = Some(Arc::new(code));
        self.account_dirty = true;
        Ok(())
    }

    /// Reads a storage slot: dirty overlay first, then read cache, then
    /// the underlying tree (caching the result).
    pub fn get_state(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(v) = self.dirty_storage.get(key) {
            return Ok(v.clone());
        }
        if let Some(v) = self.cache_storage.get(key) {
            return Ok(Some(v.clone()));
        }
        let value = self.storage.get(key)?;
        if let Some(v) = &value {
            self.cache_storage.insert(key.to_vec(), v.clone());
        }
        Ok(value)
    }

    pub fn set_state(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.dirty_storage.insert(key, Some(value));
    }

    pub fn delete_state(&mut self, key: Vec<u8>) {
        self.dirty_storage.insert(key, None);
    }

    pub fn is_dirty(&self) -> bool {
        self.account_dirty || !self.dirty_storage.is_empty()
    }

    /// A fully untouched, zero-value account with no code — eligible for
    /// pruning from the parent DB (§4.2).
    pub fn is_empty(&self) -> bool {
        self.account.nonce == 0
            && self.account.balance.is_zero()
            && self.account.code_hash.is_zero()
    }

    /// Flushes pending storage writes into the storage tree and recomputes
    /// `storage_root`, without persisting the tree to the KV store. Used
    /// for `intermediate_root` (§4.5), which must reflect in-flight writes
    /// without committing them.
    pub fn update_storage_root(&mut self) -> Result<Hash> {
        if self.dirty_storage.is_empty() {
            return Ok(self.account.storage_root);
        }
        let mut ws = WriteSet::new();
        for (key, value) in self.dirty_storage.drain() {
            match value {
                Some(v) => {
                    self.cache_storage.insert(key.clone(), v.clone());
                    ws.put(key, v);
                }
                None => {
                    self.cache_storage.remove(&key);
                    ws.delete(key);
                }
            }
        }
        self.storage.process(&ws)?;
        let root = self.storage.prepare()?;
        self.account.storage_root = root;
        Ok(root)
    }

    /// Commits the storage tree to the KV store and clears dirty tracking.
    /// Must be preceded by (or include) an `update_storage_root` pass.
    pub fn commit_storage(&mut self) -> Result<Hash> {
        self.update_storage_root()?;
        let root = self.storage.commit()?;
        self.account.storage_root = root;
        self.account_dirty = false;
        self.original = self.account;
        Ok(root)
    }

    /// A copy-on-write snapshot of this object, for the state DB's
    /// per-account snapshot/revert support.
    pub fn copy(&self) -> StateObject {
        StateObject {
            address: self.address,
            account: self.account,
            original: self.original,
            code: self.code.clone(),
            storage: self.storage.copy(),
            cache_storage: self.cache_storage.clone(),
            dirty_storage: self.dirty_storage.clone(),
            account_dirty: self.account_dirty,
        }
    }
}
