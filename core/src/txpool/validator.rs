//! Stateless and state-dependent transaction admission checks, grounded in
//! `original_source/executor/tx_validator.go`.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::state::StateDB;
use crate::types::Transaction;

pub trait TxValidator: Send + Sync {
    /// Checks that can be made without consulting state: payload size,
    /// signature validity, sender/`from` agreement.
    fn validate_stateless(&self, tx: &Transaction, config: &Config) -> Result<()>;

    /// Checks that require the current account view: nonce and balance.
    fn validate_against_state(&self, tx: &Transaction, state: &StateDB) -> Result<()>;
}

#[derive(Default)]
pub struct DefaultTxValidator;

impl TxValidator for DefaultTxValidator {
    fn validate_stateless(&self, tx: &Transaction, config: &Config) -> Result<()> {
        if tx.data.payload.len() > config.max_tx_payload_bytes {
            return Err(Error::TxTooLarge);
        }
        tx.sender()?;
        Ok(())
    }

    fn validate_against_state(&self, tx: &Transaction, state: &StateDB) -> Result<()> {
        let from = tx.data.from;
        let account_nonce = state.get_nonce(from)?;
        if tx.nonce() < account_nonce {
            return Err(Error::NonceTooLow {
                expected: account_nonce,
                got: tx.nonce(),
            });
        }
        let balance = state.get_balance(from)?;
        if tx.cost() > balance {
            return Err(Error::InsufficientBalance);
        }
        Ok(())
    }
}
