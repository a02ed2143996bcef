//! A typed publish/subscribe bus modeled on `original_source/event/{bus.go,
//! feed.go,subscription.go}`'s `TypeMux`/`Feed`: every subscriber gets a
//! bounded channel of capacity 1, and [`EventBus::post`] awaits delivery to
//! each one in turn. A slow subscriber is never silently dropped — it
//! backpressures the whole bus instead, exactly like the Go `Feed`, which
//! blocks `Send` until every subscriber channel has room.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

const SUBSCRIBER_CHANNEL_CAPACITY: usize = 1;

struct Inner<T> {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<T>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// A clonable handle to a single event bus instance.
pub struct EventBus<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        EventBus {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        EventBus {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a new subscriber. Its channel fills to capacity 1 before
    /// any further `post` blocks waiting on it.
    pub fn subscribe(&self) -> Subscription<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        self.inner.subscribers.lock().insert(id, tx);
        Subscription {
            id,
            bus: self.inner.clone(),
            rx,
        }
    }

    /// Delivers `event` to every current subscriber, awaiting each send.
    /// A subscriber whose channel is closed (receiver dropped) is pruned
    /// silently; that is the caller unsubscribing, not an error.
    pub async fn post(&self, event: T) -> Result<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::MuxClosed);
        }
        let senders: Vec<(u64, mpsc::Sender<T>)> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut dead = Vec::new();
        for (id, tx) in senders {
            if tx.send(event.clone()).await.is_err() {
                dead.push(id);
            }
        }
        if !dead.is_empty() {
            let mut subs = self.inner.subscribers.lock();
            for id in dead {
                subs.remove(&id);
            }
        }
        Ok(())
    }

    /// Stops the bus: further `post` calls return `MuxClosed` and all
    /// subscriber channels are closed, waking any blocked receivers.
    pub fn stop(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.subscribers.lock().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

/// A live subscription. Dropping it unregisters from the bus.
pub struct Subscription<T> {
    id: u64,
    bus: Arc<Inner<T>>,
    rx: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        // Dropping `self` removes the subscriber via `Drop`.
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.bus.subscribers.lock().remove(&self.id);
    }
}
