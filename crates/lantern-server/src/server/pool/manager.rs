//! Worker pool and backlog replenishment.
//!
//! This module defines the [`WorkerPool`]: a fixed set of asynchronous
//! workers fed over bounded MPSC channels in round-robin order, plus the
//! replenishment scheduler that keeps every pool key's backlog near its
//! target. Workers hold no lock while synthesizing; the store guard covers
//! only the final insert.

use crate::server::config::ServerConfig;
use crate::server::error::{Result, ServiceError};
use crate::server::pool::worker::{GenJob, worker_loop};
use crate::server::store::{PoolKey, PoolStore};
use crate::server::synth::Synthesize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// A pool of background generation workers.
///
/// Dispatch never waits: jobs go to the next worker's bounded queue or are
/// dropped with an error, so the request path stays non-blocking. The pool
/// supports graceful, cancellable shutdown.
pub struct WorkerPool {
    workers: Vec<mpsc::Sender<GenJob>>,
    next_worker: AtomicUsize,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
    backlog_target: usize,
    store: Arc<PoolStore>,
}

impl WorkerPool {
    /// Spawn `config.num_workers` workers, each with its own bounded queue.
    pub fn new(config: &ServerConfig, store: Arc<PoolStore>, synth: Arc<dyn Synthesize>) -> Self {
        let shutdown_token = CancellationToken::new();
        let mut workers = Vec::with_capacity(config.num_workers);

        for worker_id in 0..config.num_workers {
            let (tx, rx) = mpsc::channel(config.job_buffer);
            workers.push(tx);
            tokio::spawn(worker_loop(
                worker_id,
                rx,
                Arc::clone(&store),
                Arc::clone(&synth),
                shutdown_token.clone(),
            ));
        }

        Self {
            workers,
            next_worker: AtomicUsize::new(0),
            shutdown_token,
            shutdown_timeout: config.shutdown_timeout,
            backlog_target: config.backlog_target,
            store,
        }
    }

    /// Index of the next worker to receive work (round-robin).
    fn next_worker_index(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    /// Enqueue one job without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is shutting down or the chosen
    /// worker's queue is closed or full.
    pub fn dispatch(&self, job: GenJob) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(ServiceError::Shutdown);
        }
        let worker_idx = self.next_worker_index();
        self.workers[worker_idx]
            .try_send(job)
            .map_err(|_| ServiceError::Channel {
                context: format!("worker {worker_idx} queue is closed or full"),
            })
    }

    /// Top the backlog for `key` back up to the target.
    ///
    /// Reads the current count and enqueues one generation job per missing
    /// board, fire-and-forget. Over-launching under concurrent fetches is
    /// tolerated; a crashed worker's shortfall is corrected by whichever
    /// fetch comes next. Returns the number of jobs enqueued.
    pub async fn replenish(&self, key: PoolKey) -> Result<usize> {
        let store = Arc::clone(&self.store);
        let count_key = key.clone();
        let backlog = tokio::task::spawn_blocking(move || store.count(&count_key)).await??;

        let missing = self.backlog_target.saturating_sub(backlog);
        let mut launched = 0;
        for _ in 0..missing {
            match self.dispatch(GenJob::Generate { key: key.clone() }) {
                Ok(()) => launched += 1,
                Err(err) => {
                    tracing::warn!(%key, error = %err, "replenish dispatch dropped");
                    break;
                }
            }
        }
        if launched > 0 {
            tracing::debug!(%key, backlog, launched, "replenishing backlog");
        }
        Ok(launched)
    }

    /// Gracefully shut down all workers.
    ///
    /// - Cancels the shared token so queued jobs are skipped and new
    ///   dispatches are refused.
    /// - Sends a [`GenJob::Shutdown`] to each worker.
    /// - Waits up to the configured grace period per worker for
    ///   acknowledgements.
    pub async fn shutdown(&self) {
        tracing::debug!("cancelling queued generation jobs");
        self.shutdown_token.cancel();

        tracing::debug!("notifying all workers to shut down");
        let mut acks = Vec::with_capacity(self.workers.len());
        for (i, worker) in self.workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            if let Err(err) = worker.send(GenJob::Shutdown { response: tx }).await {
                tracing::error!("failed to send shutdown to worker {i}: {err}");
            } else {
                acks.push((i, rx));
            }
        }

        let grace = self.shutdown_timeout;
        let waits = acks.into_iter().map(|(i, rx)| async move {
            match timeout(grace, rx).await {
                Ok(Ok(())) => tracing::trace!("worker {i} shutdown acknowledged"),
                Ok(Err(err)) => tracing::error!("worker {i} dropped its ack: {err}"),
                Err(_) => tracing::warn!("worker {i} shutdown timed out"),
            }
        });
        futures::future::join_all(waits).await;

        tracing::info!("worker pool shutdown complete");
    }
}
