//! Generic count-or-timeout batching, shared by the tx pool and block pool
//! (§4.6, §4.7): collect items until either `capacity` have arrived or
//! `timeout` has elapsed since the first item in the current batch, then
//! flush and start over.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

/// Consumes items from `input` and calls `on_flush` with each batch.
/// Runs until `input` is closed, then flushes whatever remains.
pub struct Batcher<T> {
    capacity: usize,
    timeout: Duration,
    input: mpsc::Receiver<T>,
}

impl<T: Send + 'static> Batcher<T> {
    pub fn new(capacity: usize, timeout: Duration) -> (Self, mpsc::Sender<T>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Batcher {
                capacity,
                timeout,
                input: rx,
            },
            tx,
        )
    }

    /// Runs the batching loop, awaiting `on_flush` for every non-empty
    /// batch, until the input channel is closed and drained.
    pub async fn run<F, Fut>(mut self, mut on_flush: F)
    where
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut batch = Vec::with_capacity(self.capacity);
        let mut deadline: Option<Instant> = None;

        loop {
            let sleep = match deadline {
                Some(d) => tokio::time::sleep_until(d),
                None => tokio::time::sleep(self.timeout),
            };
            tokio::pin!(sleep);

            tokio::select! {
                item = self.input.recv() => {
                    match item {
                        Some(item) => {
                            if batch.is_empty() {
                                deadline = Some(Instant::now() + self.timeout);
                            }
                            batch.push(item);
                            if batch.len() >= self.capacity {
                                on_flush(std::mem::take(&mut batch)).await;
                                deadline = None;
                            }
                        }
                        None => {
                            if !batch.is_empty() {
                                on_flush(std::mem::take(&mut batch)).await;
                            }
                            return;
                        }
                    }
                }
                _ = &mut sleep, if deadline.is_some() => {
                    if !batch.is_empty() {
                        on_flush(std::mem::take(&mut batch)).await;
                    }
                    deadline = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn flushes_on_capacity() {
        let (batcher, tx) = Batcher::<u32>::new(3, Duration::from_secs(10));
        let flushes = Arc::new(Mutex::new(Vec::new()));
        let recorded = flushes.clone();
        let handle = tokio::spawn(async move {
            batcher
                .run(|batch| {
                    let recorded = recorded.clone();
                    async move {
                        recorded.lock().await.push(batch);
                    }
                })
                .await;
        });

        for i in 0..3 {
            tx.send(i).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*flushes.lock().await, vec![vec![0, 1, 2]]);
    }

    #[tokio::test]
    async fn flushes_on_timeout() {
        let (batcher, tx) = Batcher::<u32>::new(10, Duration::from_millis(20));
        let flushes = Arc::new(Mutex::new(Vec::new()));
        let recorded = flushes.clone();
        let handle = tokio::spawn(async move {
            batcher
                .run(|batch| {
                    let recorded = recorded.clone();
                    async move {
                        recorded.lock().await.push(batch);
                    }
                })
                .await;
        });

        tx.send(1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*flushes.lock().await, vec![vec![1]]);
    }

    #[tokio::test]
    async fn flushes_remainder_on_close() {
        let (batcher, tx) = Batcher::<u32>::new(10, Duration::from_secs(10));
        let flushes = Arc::new(Mutex::new(Vec::new()));
        let recorded = flushes.clone();
        let handle = tokio::spawn(async move {
            batcher
                .run(|batch| {
                    let recorded = recorded.clone();
                    async move {
                        recorded.lock().await.push(batch);
                    }
                })
                .await;
        });

        tx.send(7).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*flushes.lock().await, vec![vec![7]]);
    }
}
