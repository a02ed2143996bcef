//! On-chain account representation (§4.2).
//!
//! Mirrors `original_source/core/state/state_obj.go`'s `Account` struct:
//! nonce, balance, the root of the account's per-slot storage tree, and the
//! hash of its contract code (zero hash for externally-owned accounts).

use serde::{Deserialize, Serialize};

use crate::{Address, Amount, Hash};

/// The persisted, canonically-hashable form of an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub nonce: u64,
    pub balance: Amount,
    pub storage_root: Hash,
    pub code_hash: Hash,
}

impl Account {
    /// A brand-new, never-touched account: zero nonce and balance, empty
    /// storage tree, no code.
    pub fn empty() -> Self {
        Account {
            nonce: 0,
            balance: Amount::ZERO,
            storage_root: Hash::ZERO,
            code_hash: Hash::ZERO,
        }
    }

    pub fn is_contract(&self) -> bool {
        !self.code_hash.is_zero()
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::empty()
    }
}

/// Associates an [`Account`] with the [`Address`] it lives at — used when
/// handing accounts across module boundaries where the key would otherwise
/// be lost.
#[derive(Debug, Clone, Copy)]
pub struct AddressedAccount {
    pub address: Address,
    pub account: Account,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_account_is_not_a_contract() {
        let a = Account::empty();
        assert!(!a.is_contract());
        assert_eq!(a.nonce, 0);
        assert!(a.balance.is_zero());
    }
}
