//! A single sender's nonce-ordered transaction list.
//!
//! Grounded in `original_source/executor/txpool/tx_list.go`. The Go version
//! keeps an unordered map plus a separately cached sorted slice; a
//! `BTreeMap<u64, Transaction>` gives the same nonce ordering for free and
//! makes `ready`/`forget`/`release` straightforward range operations.

use std::collections::BTreeMap;

use crate::types::Transaction;
use crate::Amount;

/// Outcome of attempting to insert at a nonce already occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No transaction occupied this nonce; the new one is always admitted.
    Inserted,
    /// A transaction already occupied this nonce and the new one bumped
    /// its `gas_limit` by at least the configured percentage.
    Replaced,
    /// A transaction already occupied this nonce and the new one did not
    /// bump enough to replace it.
    Rejected,
}

#[derive(Default)]
pub struct TxList {
    by_nonce: BTreeMap<u64, Transaction>,
}

impl TxList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, nonce: u64) -> Option<&Transaction> {
        self.by_nonce.get(&nonce)
    }

    pub fn len(&self) -> usize {
        self.by_nonce.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_nonce.is_empty()
    }

    /// Whether a transaction at `nonce` with `gas_limit` would be admitted
    /// if inserted now, and the transaction it would replace, if any. An
    /// empty slot always admits (§9 open question: no prior tx at a nonce
    /// is never itself a reason to reject).
    pub fn can_insert(&self, nonce: u64, gas_limit: u64, price_bump_pct: u64) -> (bool, Option<&Transaction>) {
        match self.by_nonce.get(&nonce) {
            None => (true, None),
            Some(existing) => {
                let threshold = existing.gas_limit() + existing.gas_limit() * price_bump_pct / 100;
                (gas_limit >= threshold, Some(existing))
            }
        }
    }

    /// Inserts `tx`, replacing whatever occupied its nonce if the
    /// replacement policy admits it. Returns the admission outcome and the
    /// replaced transaction, if any.
    pub fn add(&mut self, tx: Transaction, price_bump_pct: u64) -> (Admission, Option<Transaction>) {
        let nonce = tx.nonce();
        let (admit, _) = self.can_insert(nonce, tx.gas_limit(), price_bump_pct);
        if !admit {
            return (Admission::Rejected, None);
        }
        let had_existing = self.by_nonce.contains_key(&nonce);
        let old = self.by_nonce.insert(nonce, tx);
        let outcome = if had_existing {
            Admission::Replaced
        } else {
            Admission::Inserted
        };
        (outcome, old)
    }

    pub fn put(&mut self, tx: Transaction) -> Option<Transaction> {
        self.by_nonce.insert(tx.nonce(), tx)
    }

    pub fn del(&mut self, nonce: u64) -> Option<Transaction> {
        self.by_nonce.remove(&nonce)
    }

    pub fn all(&self) -> Vec<&Transaction> {
        self.by_nonce.values().collect()
    }

    /// Removes and returns every transaction matching `predicate`.
    pub fn filter<F: Fn(&Transaction) -> bool>(&mut self, predicate: F) -> Vec<Transaction> {
        let matching: Vec<u64> = self
            .by_nonce
            .iter()
            .filter(|(_, tx)| predicate(tx))
            .map(|(&n, _)| n)
            .collect();
        matching
            .into_iter()
            .filter_map(|n| self.by_nonce.remove(&n))
            .collect()
    }

    /// Drops every transaction whose nonce is already behind the account's
    /// current nonce — it can never execute and will never become ready.
    pub fn forget(&mut self, current_nonce: u64) -> Vec<Transaction> {
        self.filter(|tx| tx.nonce() < current_nonce)
    }

    /// Drops every transaction, from the first affordability gap onward,
    /// the sender can no longer pay for given `balance`. Cumulative cost is
    /// walked in nonce order since an affordable nonce can be starved by an
    /// unaffordable earlier one.
    pub fn release(&mut self, balance: Amount) -> Vec<Transaction> {
        let mut spent = Amount::ZERO;
        let mut cutoff: Option<u64> = None;
        for (&nonce, tx) in self.by_nonce.iter() {
            spent = match spent.checked_add(tx.cost()) {
                Some(v) => v,
                None => {
                    cutoff = Some(nonce);
                    break;
                }
            };
            if spent > balance {
                cutoff = Some(nonce);
                break;
            }
        }
        match cutoff {
            Some(from) => self.filter(|tx| tx.nonce() >= from),
            None => Vec::new(),
        }
    }

    /// Removes and returns the contiguous run of transactions starting
    /// exactly at `from_nonce` — the prefix immediately executable against
    /// the account's current nonce.
    pub fn ready(&mut self, from_nonce: u64) -> Vec<Transaction> {
        let mut out = Vec::new();
        let mut expected = from_nonce;
        loop {
            match self.by_nonce.remove(&expected) {
                Some(tx) => {
                    out.push(tx);
                    expected += 1;
                }
                None => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxData;
    use crate::{Address, Amount};

    fn tx(nonce: u64, gas_limit: u64, value: u64) -> Transaction {
        Transaction::new_unsigned(TxData {
            nonce,
            gas_limit,
            value: Amount::from_u64(value),
            from: Address::ZERO,
            to: Some(Address::from_slice(&[1; 20])),
            payload: Vec::new(),
        })
    }

    #[test]
    fn can_insert_with_no_prior_tx_always_admits() {
        let list = TxList::new();
        assert_eq!(list.can_insert(0, 1, 10), (true, None));
    }

    #[test]
    fn replacement_requires_price_bump() {
        let mut list = TxList::new();
        list.add(tx(0, 100, 0), 10);
        let (outcome, _) = list.add(tx(0, 105, 0), 10);
        assert_eq!(outcome, Admission::Rejected);
        let (outcome, old) = list.add(tx(0, 111, 0), 10);
        assert_eq!(outcome, Admission::Replaced);
        assert_eq!(old.unwrap().gas_limit(), 100);
    }

    #[test]
    fn ready_returns_contiguous_prefix_only() {
        let mut list = TxList::new();
        list.put(tx(0, 1, 0));
        list.put(tx(1, 1, 0));
        list.put(tx(3, 1, 0));
        let ready = list.ready(0);
        assert_eq!(ready.iter().map(|t| t.nonce()).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn forget_drops_only_stale_nonces() {
        let mut list = TxList::new();
        list.put(tx(0, 1, 0));
        list.put(tx(1, 1, 0));
        list.put(tx(2, 1, 0));
        let forgotten = list.forget(2);
        assert_eq!(forgotten.iter().map(|t| t.nonce()).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn release_drops_from_first_unaffordable_nonce_onward() {
        let mut list = TxList::new();
        list.put(tx(0, 1, 10));
        list.put(tx(1, 1, 10));
        list.put(tx(2, 1, 10));
        let released = list.release(Amount::from_u64(15));
        assert_eq!(released.iter().map(|t| t.nonce()).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(list.len(), 1);
    }
}
