//! The world state: a top-level account tree plus a live cache of
//! per-account [`StateObject`]s.
//!
//! Grounded in `original_source/core/state/{db.go,statedb.go}`. Accounts
//! are keyed by address in a [`Tree`] whose root is the state root; each
//! account's own storage lives in its own [`Tree`], rooted at the
//! account's `storage_root` field. [`StateDB::intermediate_root`] folds in
//! every pending write without touching the KV store — used between
//! transactions within a block — while [`StateDB::commit`] additionally
//! persists everything.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::one::RefMut;

use crate::bmt::{Tree, WriteSet};
use crate::canonical::{to_canonical_bytes, sha256};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::kv::KvStore;
use crate::state::account::Account;
use crate::state::code_store::CodeStore;
use crate::state::object::StateObject;
use crate::{Address, Amount, Hash};

pub struct StateDB {
    kv: Arc<dyn KvStore>,
    capacity: usize,
    aggregation: usize,
    accounts: Tree,
    code: Arc<CodeStore>,
    objects: DashMap<Address, StateObject>,
    dirty: DashMap<Address, ()>,
}

impl StateDB {
    pub fn open(kv: Arc<dyn KvStore>, config: &Config, state_root: Hash) -> Result<Self> {
        let accounts = Tree::open(kv.clone(), config.bmt_capacity, config.bmt_aggregation, state_root)?;
        let code = Arc::new(CodeStore::new(kv.clone(), 1024));
        Ok(StateDB {
            kv,
            capacity: config.bmt_capacity,
            aggregation: config.bmt_aggregation,
            accounts,
            code,
            objects: DashMap::new(),
            dirty: DashMap::new(),
        })
    }

    pub fn state_root(&self) -> Hash {
        self.accounts.root()
    }

    pub fn code_store(&self) -> &Arc<CodeStore> {
        &self.code
    }

    fn load_account(&self, address: &Address) -> Result<Account> {
        match self.accounts.get(address.as_bytes())? {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))
            }
            None => Ok(Account::empty()),
        }
    }

    /// Returns the live object for `address`, loading it from the account
    /// tree on first access.
    fn object_mut(&self, address: Address) -> Result<RefMut<'_, Address, StateObject>> {
        if !self.objects.contains_key(&address) {
            let account = self.load_account(&address)?;
            let storage = Tree::open(self.kv.clone(), self.capacity, self.aggregation, account.storage_root)?;
            self.objects.insert(address, StateObject::new(address, account, storage));
        }
        Ok(self.objects.get_mut(&address).expect("just inserted"))
    }

    pub fn get_nonce(&self, address: Address) -> Result<u64> {
        Ok(self.object_mut(address)?.nonce())
    }

    pub fn get_balance(&self, address: Address) -> Result<Amount> {
        Ok(self.object_mut(address)?.balance())
    }

    pub fn get_code_hash(&self, address: Address) -> Result<Hash> {
        Ok(self.object_mut(address)?.code_hash())
    }

    pub fn get_code(&self, address: Address) -> Result<Arc<Vec<u8>>> {
        self.object_mut(address)?.code(&self.code)
    }

    pub fn get_state(&self, address: Address, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.object_mut(address)?.get_state(key)
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) -> Result<()> {
        self.object_mut(address)?.set_nonce(nonce);
        self.dirty.insert(address, ());
        Ok(())
    }

    pub fn set_balance(&self, address: Address, balance: Amount) -> Result<()> {
        self.object_mut(address)?.set_balance(balance);
        self.dirty.insert(address, ());
        Ok(())
    }

    pub fn add_balance(&self, address: Address, amount: Amount) -> Result<()> {
        self.object_mut(address)?
            .add_balance(amount)
            .ok_or(Error::Other("balance overflow".into()))?;
        self.dirty.insert(address, ());
        Ok(())
    }

    pub fn sub_balance(&self, address: Address, amount: Amount) -> Result<()> {
        self.object_mut(address)?
            .sub_balance(amount)
            .ok_or(Error::InsufficientBalance)?;
        self.dirty.insert(address, ());
        Ok(())
    }

    /// Debits `amount` from `from` and credits it to `to` atomically from
    /// the caller's point of view (§4.5's value-transfer step).
    pub fn transfer(&self, from: Address, to: Address, amount: Amount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.sub_balance(from, amount)?;
        self.add_balance(to, amount)?;
        Ok(())
    }

    pub fn set_code(&self, address: Address, code: Vec<u8>) -> Result<()> {
        self.object_mut(address)?.set_code(&self.code, code)?;
        self.dirty.insert(address, ());
        Ok(())
    }

    pub fn set_state(&self, address: Address, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.object_mut(address)?.set_state(key, value);
        self.dirty.insert(address, ());
        Ok(())
    }

    /// Derives an address' deterministic identity hash used only for
    /// content-addressing debugging aids; not part of consensus state.
    pub fn object_fingerprint(&self, address: Address) -> Hash {
        sha256(address.as_bytes())
    }

    /// Folds every pending write into the account tree and returns the
    /// resulting root, without writing anything to the KV store.
    pub fn intermediate_root(&mut self) -> Result<Hash> {
        let dirty: Vec<Address> = self.dirty.iter().map(|e| *e.key()).collect();
        let mut ws = WriteSet::new();
        for address in &dirty {
            let mut obj = self.objects.get_mut(address).expect("dirty implies loaded");
            obj.update_storage_root()?;
            let bytes = to_canonical_bytes(&obj.account());
            ws.put(address.as_bytes().to_vec(), bytes);
        }
        if !ws.is_empty() {
            self.accounts.process(&ws)?;
        }
        self.accounts.prepare()
    }

    /// Commits every dirty account's storage tree and the account tree
    /// itself to the KV store, then clears dirty tracking.
    pub fn commit(&mut self) -> Result<Hash> {
        let dirty: Vec<Address> = self.dirty.iter().map(|e| *e.key()).collect();
        let mut ws = WriteSet::new();
        for address in &dirty {
            let mut obj = self.objects.get_mut(address).expect("dirty implies loaded");
            obj.commit_storage()?;
            let bytes = to_canonical_bytes(&obj.account());
            ws.put(address.as_bytes().to_vec(), bytes);
        }
        if !ws.is_empty() {
            self.accounts.process(&ws)?;
        }
        let root = self.accounts.commit()?;
        self.dirty.clear();
        Ok(root)
    }
}
