//! The transaction pool: a two-stage admission pipeline (§4.6).
//!
//! [`TxPool::add`] checks duplication, then stateless/stateful validity,
//! then pool capacity; a nonce already occupying a slot in `pending` is
//! then tried for replacement before falling through to `queue`. Once a
//! tx lands in `queue`, activating its sender drops anything already
//! applied (`forget`) or no longer affordable (`release`), in that order,
//! before promoting the contiguous nonce-ordered run starting at the
//! account's next expected nonce into `pending`. Promotions feed a
//! [`Batcher`] that flushes `ExecPendingTx` events once it has enough of
//! them or enough time has passed.
//!
//! Grounded in `original_source/executor/txpool/tx_pool.go`. Concurrency
//! follows the pack's fine-grained style: a [`DashMap`] keyed by sender so
//! unrelated senders never contend, a `Mutex` per sender's list for the
//! multi-step forget/release/promote sequence, and an [`RwLock`]-backed
//! [`TxLookup`] for O(1) cross-sender duplicate detection.

mod lookup;
mod tx_list;
mod validator;

pub use lookup::TxLookup;
pub use tx_list::{Admission, TxList};
pub use validator::{DefaultTxValidator, TxValidator};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::batcher::Batcher;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{Event, EventBus};
use crate::state::StateDB;
use crate::types::Transaction;
use crate::{Address, Hash};

pub struct TxPool {
    config: Config,
    state: Arc<StateDB>,
    validator: Arc<dyn TxValidator>,
    queue: DashMap<Address, Arc<Mutex<TxList>>>,
    pending: DashMap<Address, Arc<Mutex<TxList>>>,
    lookup: TxLookup,
    total: AtomicUsize,
    promote_tx: mpsc::Sender<Hash>,
}

impl TxPool {
    /// Builds a pool and the [`Batcher`] that drives its promotion events.
    /// Callers spawn [`run_batcher`] over the returned batcher to wire it
    /// to an [`EventBus`]; the pool itself never spawns tasks.
    pub fn new(
        config: Config,
        state: Arc<StateDB>,
        validator: Arc<dyn TxValidator>,
    ) -> (Arc<TxPool>, Batcher<Hash>) {
        let (batcher, promote_tx) = Batcher::new(config.tx_batch_capacity, config.tx_batch_timeout);
        let pool = Arc::new(TxPool {
            config,
            state,
            validator,
            queue: DashMap::new(),
            pending: DashMap::new(),
            lookup: TxLookup::new(),
            total: AtomicUsize::new(0),
            promote_tx,
        });
        (pool, batcher)
    }

    pub fn len(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.lookup.contains(hash)
    }

    pub fn pending_txs(&self, address: Address) -> Vec<Transaction> {
        self.pending
            .get(&address)
            .map(|l| l.lock().all().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn queued_txs(&self, address: Address) -> Vec<Transaction> {
        self.queue
            .get(&address)
            .map(|l| l.lock().all().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Validates and admits `tx`, then activates its sender so any
    /// newly-contiguous run of queued transactions is promoted to
    /// `pending`.
    pub async fn add(&self, tx: Transaction) -> Result<()> {
        let hash = tx.hash();
        if self.lookup.contains(&hash) {
            return Err(Error::TxDuplicate);
        }
        self.validator.validate_stateless(&tx, &self.config)?;
        self.validator.validate_against_state(&tx, &self.state)?;
        if self.total.load(Ordering::Relaxed) >= self.config.max_tx_pool_size {
            return Err(Error::PoolFull);
        }

        let from = tx.data.from;
        let nonce = tx.nonce();

        // A nonce already promoted to `pending` can still be replaced by a
        // sufficiently higher-gas transaction, same policy as `queue`.
        if let Some(pending_entry) = self.pending.get(&from).map(|e| e.clone()) {
            let mut list = pending_entry.lock();
            if list.get(nonce).is_some() {
                let (outcome, replaced) = list.add(tx, self.config.price_bump);
                drop(list);
                return match outcome {
                    Admission::Rejected => Err(Error::TxDiscard),
                    Admission::Replaced => {
                        if let Some(old) = &replaced {
                            self.lookup.remove(&old.hash());
                        }
                        self.lookup.insert(hash);
                        debug!(sender = %from, %hash, "pending transaction replaced");
                        Ok(())
                    }
                    Admission::Inserted => {
                        self.total.fetch_add(1, Ordering::Relaxed);
                        self.lookup.insert(hash);
                        Ok(())
                    }
                };
            }
        }

        let entry = self
            .queue
            .entry(from)
            .or_insert_with(|| Arc::new(Mutex::new(TxList::new())))
            .clone();
        let (outcome, replaced) = entry.lock().add(tx, self.config.price_bump);
        match outcome {
            Admission::Rejected => return Err(Error::TxDiscard),
            Admission::Inserted => {
                self.total.fetch_add(1, Ordering::Relaxed);
            }
            Admission::Replaced => {
                if let Some(old) = &replaced {
                    self.lookup.remove(&old.hash());
                }
            }
        }
        self.lookup.insert(hash);
        debug!(sender = %from, %hash, "transaction queued");

        self.activate(from).await
    }

    /// Drops stale/unaffordable transactions for `address` and promotes
    /// the contiguous executable prefix from `queue` into `pending`.
    pub async fn activate(&self, address: Address) -> Result<()> {
        let account_nonce = self.state.get_nonce(address)?;
        let balance = self.state.get_balance(address)?;

        let queue_list = self.queue.get(&address).map(|e| e.clone());
        if let Some(queue_list) = &queue_list {
            let forgotten = queue_list.lock().forget(account_nonce);
            self.total.fetch_sub(forgotten.len(), Ordering::Relaxed);
            for tx in &forgotten {
                self.lookup.remove(&tx.hash());
            }
        }

        let pending_list = self
            .pending
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(TxList::new())))
            .clone();
        let (forgotten, released, pending_len) = {
            let mut pending = pending_list.lock();
            let forgotten = pending.forget(account_nonce);
            let released = pending.release(balance);
            (forgotten, released, pending.len())
        };
        self.total
            .fetch_sub(forgotten.len() + released.len(), Ordering::Relaxed);
        for tx in forgotten.iter().chain(released.iter()) {
            self.lookup.remove(&tx.hash());
        }

        let expected_next = account_nonce + pending_len as u64;
        let ready = match &queue_list {
            Some(queue_list) => queue_list.lock().ready(expected_next),
            None => Vec::new(),
        };
        if ready.is_empty() {
            return Ok(());
        }

        let hashes: Vec<Hash> = {
            let mut pending = pending_list.lock();
            ready
                .into_iter()
                .map(|tx| {
                    let hash = tx.hash();
                    pending.put(tx);
                    hash
                })
                .collect()
        };
        for hash in hashes {
            let _ = self.promote_tx.send(hash).await;
        }
        Ok(())
    }
}

/// Drives `batcher`'s flushed hash batches onto `bus` as
/// [`Event::ExecPendingTx`]. Intended to be `tokio::spawn`ed alongside a
/// [`TxPool`].
pub async fn run_batcher(batcher: Batcher<Hash>, bus: EventBus<Event>) {
    batcher
        .run(|batch| {
            let bus = bus.clone();
            async move {
                let _ = bus.post(Event::ExecPendingTx(batch)).await;
            }
        })
        .await;
}
