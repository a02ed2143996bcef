//! Account-model transactions (§4.3, §4.5).
//!
//! Ground truth: `original_source/core/types/transaction.go`'s `txData`.
//! Unlike the UTXO model this replaces, a transaction here debits a single
//! `from` account by `nonce` and `value`, optionally calling into or
//! creating a contract at `to` (`None` means "create").

use std::sync::OnceLock;

use ed25519_dalek::{PublicKey, Signature};
use serde::{Deserialize, Serialize};

use crate::canonical::hash_of;
use crate::error::{Error, Result};
use crate::{Address, Amount, Hash};

/// The canonically-hashed, signable body of a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxData {
    pub nonce: u64,
    pub gas_limit: u64,
    pub value: Amount,
    pub from: Address,
    pub to: Option<Address>,
    pub payload: Vec<u8>,
}

/// A transaction together with its detached signature and signer key.
///
/// The signature is detached (kept out of [`TxData`]) so that hashing and
/// signing operate over the same canonical bytes: a transaction's hash
/// never depends on who signed it, only on what it says.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub data: TxData,
    pub signature: Option<Signature>,
    pub sender_pubkey: Option<PublicKey>,
    #[serde(skip)]
    hash: OnceLock<Hash>,
}

impl Transaction {
    pub fn new_unsigned(data: TxData) -> Self {
        Transaction {
            data,
            signature: None,
            sender_pubkey: None,
            hash: OnceLock::new(),
        }
    }

    /// Deterministic content hash, memoized on first use.
    pub fn hash(&self) -> Hash {
        *self.hash.get_or_init(|| hash_of(&self.data))
    }

    pub fn nonce(&self) -> u64 {
        self.data.nonce
    }

    pub fn gas_limit(&self) -> u64 {
        self.data.gas_limit
    }

    pub fn value(&self) -> Amount {
        self.data.value
    }

    pub fn is_create(&self) -> bool {
        self.data.to.is_none()
    }

    /// Upper bound on what this transaction can cost its sender:
    /// `gas_limit + value` (gas is charged 1:1 in this core, with no
    /// separate price multiplier). Saturates rather than wraps on overflow.
    pub fn cost(&self) -> Amount {
        Amount::from_u64(self.data.gas_limit)
            .checked_add(self.data.value)
            .unwrap_or_else(Amount::max_value)
    }

    /// Attaches a signature and the public key it was produced with. Does
    /// not itself verify the signature; see [`Transaction::sender`].
    pub fn attach_signature(&mut self, signature: Signature, pubkey: PublicKey) {
        self.signature = Some(signature);
        self.sender_pubkey = Some(pubkey);
    }

    /// Verifies the attached signature over this transaction's hash and,
    /// on success, derives and returns the sender address, checking it
    /// matches `data.from`.
    pub fn sender(&self) -> Result<Address> {
        let pubkey = self.sender_pubkey.ok_or(Error::SignNotFound)?;
        let signature = self.signature.ok_or(Error::SignNotFound)?;
        pubkey
            .verify_strict(self.hash().as_bytes(), &signature)
            .map_err(|_| Error::SignInvalid)?;
        let derived = crate::address_from_pubkey(&pubkey);
        if derived != self.data.from {
            return Err(Error::AddressMismatch);
        }
        Ok(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Keypair;
    use rand_core::OsRng;

    fn sample_data() -> TxData {
        TxData {
            nonce: 0,
            gas_limit: 21_000,
            value: Amount::from_u64(10),
            from: Address::ZERO,
            to: Some(Address::from_slice(&[9; 20])),
            payload: Vec::new(),
        }
    }

    #[test]
    fn hash_is_memoized_and_deterministic() {
        let tx = Transaction::new_unsigned(sample_data());
        assert_eq!(tx.hash(), tx.hash());
        let other = Transaction::new_unsigned(sample_data());
        assert_eq!(tx.hash(), other.hash());
    }

    #[test]
    fn cost_is_gas_limit_plus_value() {
        let tx = Transaction::new_unsigned(sample_data());
        assert_eq!(tx.cost(), Amount::from_u64(21_000 + 10));
    }

    #[test]
    fn sender_recovers_address_from_valid_signature() {
        let mut csprng = OsRng {};
        let keypair = Keypair::generate(&mut csprng);
        let address = crate::address_from_pubkey(&keypair.public);

        let mut data = sample_data();
        data.from = address;
        let mut tx = Transaction::new_unsigned(data);
        let signature = keypair.sign(tx.hash().as_bytes());
        tx.attach_signature(signature, keypair.public);

        assert_eq!(tx.sender().unwrap(), address);
    }

    #[test]
    fn mismatched_from_address_is_rejected() {
        let mut csprng = OsRng {};
        let keypair = Keypair::generate(&mut csprng);

        let mut data = sample_data();
        data.from = Address::from_slice(&[0xFF; 20]);
        let mut tx = Transaction::new_unsigned(data);
        let signature = keypair.sign(tx.hash().as_bytes());
        tx.attach_signature(signature, keypair.public);

        assert!(matches!(tx.sender(), Err(Error::AddressMismatch)));
    }
}
