//! Bounded-parallelism worker pool for reload bursts.
//!
//! A `VPReg.stg` change touches every cached table at once; reloading them
//! all in parallel would spawn one decoder process per table. The pool
//! caps that: N persistent tokio tasks pull items from a bounded
//! `async-channel` (its `Receiver` is `Clone`, so workers share it without
//! a mutex) and results come back on an unbounded channel.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Hard per-item safety net, well above the decoder timeout. If a
/// process_fn hangs past this, the worker drops it and moves on so the
/// pool can never wedge the dispatcher.
const SAFETY_TIMEOUT: Duration = Duration::from_secs(60);

/// A pool of worker tasks processing items with bounded parallelism.
pub struct WorkerPool<R: Send + 'static> {
    result_rx: mpsc::UnboundedReceiver<R>,
    _handles: Vec<JoinHandle<()>>,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Spawn `n` workers, feed them `items`, and return a handle for
    /// receiving results. Submission runs in a background task so the
    /// caller can start draining immediately.
    pub fn start<W, F, Fut>(n: usize, items: Vec<W>, process_fn: F) -> Self
    where
        W: Send + 'static,
        F: Fn(W) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let n = n.max(1);
        let (work_tx, work_rx) = async_channel::bounded::<W>(n);
        let (result_tx, result_rx) = mpsc::unbounded_channel::<R>();
        let process_fn = Arc::new(process_fn);

        let handles: Vec<JoinHandle<()>> = (0..n)
            .map(|_| {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let process_fn = process_fn.clone();
                tokio::spawn(async move {
                    while let Ok(item) = work_rx.recv().await {
                        match tokio::time::timeout(SAFETY_TIMEOUT, process_fn(item)).await {
                            Ok(result) => {
                                if result_tx.send(result).is_err() {
                                    break;
                                }
                            }
                            Err(_) => {
                                log::warn!(
                                    "Reload worker dropped an item after {}s",
                                    SAFETY_TIMEOUT.as_secs()
                                );
                            }
                        }
                    }
                })
            })
            .collect();

        // Close the result channel once the workers are done.
        drop(result_tx);

        tokio::spawn(async move {
            for item in items {
                if work_tx.send(item).await.is_err() {
                    break;
                }
            }
            // work_tx drops here; workers drain the remainder and exit.
        });

        Self { result_rx, _handles: handles }
    }

    /// Next result, or `None` once every item has been processed.
    pub async fn recv(&mut self) -> Option<R> {
        self.result_rx.recv().await
    }

    /// Drain all results, discarding them.
    pub async fn join(mut self) {
        while self.recv().await.is_some() {}
    }
}
