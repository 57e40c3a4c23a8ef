use crate::server::error::Result;
use crate::server::store::{PoolKey, PoolStore};
use crate::server::synth::Synthesize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// A unit of work for the generation pool.
pub enum GenJob {
    /// Synthesize one board for `key` and insert it into the store.
    Generate { key: PoolKey },
    /// Signals the worker to stop and acknowledge shutdown.
    Shutdown { response: oneshot::Sender<()> },
}

/// Synthesize one board for `key` and insert it under the store guard.
///
/// Runs to completion or fails without touching the store; a failed
/// synthesis never leaves a partial record behind. Shared by pool workers
/// and by the dispatcher's synchronous cache-miss path. Blocking; callers
/// on the runtime go through `spawn_blocking`.
pub fn generate_job(store: &PoolStore, synth: &dyn Synthesize, key: &PoolKey) -> Result<()> {
    tracing::info!(%key, "generating board");
    let board = synth.synthesize(key)?;
    store.insert(key, &board)?;
    tracing::info!(%key, "board ready");
    Ok(())
}

/// Worker task processing [`GenJob`]s until shut down.
///
/// Each worker listens on its own bounded channel. Jobs received after the
/// shutdown token fires are skipped so the queue drains quickly.
pub async fn worker_loop(
    worker_id: usize,
    mut rx: mpsc::Receiver<GenJob>,
    store: Arc<PoolStore>,
    synth: Arc<dyn Synthesize>,
    shutdown_token: CancellationToken,
) {
    tracing::trace!("worker {worker_id} started");

    while let Some(job) = rx.recv().await {
        match job {
            GenJob::Generate { key } => {
                if shutdown_token.is_cancelled() {
                    continue;
                }
                let store = Arc::clone(&store);
                let synth = Arc::clone(&synth);
                let outcome = tokio::task::spawn_blocking(move || {
                    generate_job(&store, synth.as_ref(), &key)
                })
                .await;
                match outcome {
                    Ok(Ok(())) => {}
                    // a background failure is invisible to clients; the next
                    // fetch's replenish call makes up the shortfall
                    Ok(Err(err)) => {
                        tracing::warn!(worker_id, error = %err, "background generation failed");
                    }
                    Err(err) => {
                        tracing::error!(worker_id, error = %err, "generation task panicked");
                    }
                }
            }
            GenJob::Shutdown { response } => {
                tracing::debug!("worker {worker_id} received shutdown signal");
                if response.send(()).is_err() {
                    tracing::error!("worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("worker {worker_id} stopped");
}
