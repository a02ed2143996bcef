//! State transition: applying one transaction to the world state (§4.5).
//!
//! Grounded in `original_source/core/{state_processor.go,
//! state_transition.go}`. [`apply_tx`] is deliberately the only place gas
//! accounting and nonce/balance preconditions live; everything
//! value-bearing beyond a plain transfer is delegated to a [`Vm`]
//! implementation, kept out of this crate's scope except for [`SimpleVm`],
//! a minimal reference implementation that only moves value — grounded in
//! `cristianizzo-libra-fork`'s `MockVM` test-double pattern, since a real
//! contract VM is explicitly out of scope here.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::state::StateDB;
use crate::types::{Receipt, ReceiptStatus, Transaction};
use crate::{Address, Amount};

/// A single transaction's execution outcome as seen by the processor:
/// how much gas it actually used.
pub struct ExecutionResult {
    pub gas_used: u64,
}

/// Hook for transaction bodies beyond plain value transfer. `create` runs
/// when `tx.to` is `None`; `call` otherwise.
pub trait Vm: Send + Sync {
    fn create(
        &self,
        state: &StateDB,
        from: Address,
        value: Amount,
        payload: &[u8],
        gas: u64,
    ) -> Result<ExecutionResult>;

    fn call(
        &self,
        state: &StateDB,
        from: Address,
        to: Address,
        value: Amount,
        payload: &[u8],
        gas: u64,
    ) -> Result<ExecutionResult>;
}

/// The base cost of a value-transfer transaction with no payload — the
/// only thing [`SimpleVm`] ever charges beyond the caller-specified
/// `gas_limit` ceiling.
pub const BASE_TX_GAS: u64 = 21_000;

/// A minimal [`Vm`] that only moves value: `call` transfers `value` to
/// `to`; `create` derives a new contract address from the sender and
/// nonce, stores `payload` verbatim as its code, and transfers `value` to
/// it. Exists so the pipeline is exercisable without a real contract VM.
#[derive(Default)]
pub struct SimpleVm;

impl SimpleVm {
    fn charge(payload: &[u8], gas: u64) -> Result<u64> {
        let used = BASE_TX_GAS + payload.len() as u64 * 16;
        if used > gas {
            return Err(Error::OutOfGas);
        }
        Ok(used)
    }
}

impl Vm for SimpleVm {
    fn create(
        &self,
        state: &StateDB,
        from: Address,
        value: Amount,
        payload: &[u8],
        gas: u64,
    ) -> Result<ExecutionResult> {
        let gas_used = Self::charge(payload, gas)?;
        let nonce = state.get_nonce(from)?;
        let contract = derive_contract_address(from, nonce);
        state.set_code(contract, payload.to_vec())?;
        if !value.is_zero() {
            state.transfer(from, contract, value)?;
        }
        Ok(ExecutionResult { gas_used })
    }

    fn call(
        &self,
        state: &StateDB,
        from: Address,
        to: Address,
        value: Amount,
        payload: &[u8],
        gas: u64,
    ) -> Result<ExecutionResult> {
        let gas_used = Self::charge(payload, gas)?;
        if !value.is_zero() {
            state.transfer(from, to, value)?;
        }
        Ok(ExecutionResult { gas_used })
    }
}

/// Deterministic contract address derivation: hash of sender and nonce,
/// last 20 bytes.
fn derive_contract_address(from: Address, nonce: u64) -> Address {
    let mut buf = Vec::with_capacity(28);
    buf.extend_from_slice(from.as_bytes());
    buf.extend_from_slice(&nonce.to_be_bytes());
    let h = crate::canonical::sha256(&buf);
    Address::from_slice(&h.0[12..])
}

pub struct StateProcessor {
    vm: Arc<dyn Vm>,
}

impl StateProcessor {
    pub fn new(vm: Arc<dyn Vm>) -> Self {
        StateProcessor { vm }
    }

    /// Applies `tx` against `state`, crediting gas fees to `coinbase`.
    ///
    /// On `InsufficientBalance` the transaction is fully rejected: no gas
    /// is charged, no state is touched, no receipt is emitted — the block
    /// builder must drop it rather than include a failed receipt (§9).
    pub fn apply_tx(&self, state: &StateDB, tx: &Transaction, coinbase: Address) -> Result<Receipt> {
        let from = tx.sender()?;

        let account_nonce = state.get_nonce(from)?;
        if tx.nonce() < account_nonce {
            return Err(Error::NonceTooLow { expected: account_nonce, got: tx.nonce() });
        }
        if tx.nonce() > account_nonce {
            return Err(Error::NonceTooHigh { expected: account_nonce, got: tx.nonce() });
        }

        let balance = state.get_balance(from)?;
        if tx.cost() > balance {
            return Err(Error::InsufficientBalance);
        }

        let gas_cost = Amount::from_u64(tx.gas_limit());
        state.sub_balance(from, gas_cost)?;

        let outcome = if let Some(to) = tx.data.to {
            state.set_nonce(from, account_nonce + 1)?;
            self.vm.call(state, from, to, tx.value(), &tx.data.payload, tx.gas_limit())
        } else {
            self.vm.create(state, from, tx.value(), &tx.data.payload, tx.gas_limit())
        };

        let (status, gas_used) = match outcome {
            Ok(result) => (ReceiptStatus::Success, result.gas_used),
            Err(_) => (ReceiptStatus::Failed, tx.gas_limit()),
        };

        let refund = Amount::from_u64(tx.gas_limit() - gas_used);
        if !refund.is_zero() {
            state.add_balance(from, refund)?;
        }
        let fee = Amount::from_u64(gas_used);
        state.add_balance(coinbase, fee)?;

        let post_state = state.intermediate_root()?;

        Ok(Receipt {
            tx_hash: tx.hash(),
            status,
            gas_used,
            post_state,
        })
    }
}
