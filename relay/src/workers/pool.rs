use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info};

use crate::concurrency::shutdown::{ShutdownRx, is_shutdown};
use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::events::EventPublisher;
use crate::limiter::RateLimiter;
use crate::lock::SyncLock;
use crate::provider::ProviderClient;
use crate::queue::JobQueue;
use crate::store::{ItemStore, TransactionStore};
use crate::sync::Syncer;

/// How long a worker blocks on the queue before re-checking shutdown.
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(2);

/// Backoff after a queue transport failure before polling again.
const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Pool of independent sync workers.
///
/// Each worker runs a single-threaded dequeue → sync cycle; parallelism
/// across items comes from running several workers, while the distributed
/// lock keeps runs on the same item mutually exclusive cluster-wide. There
/// is no shared mutable state between workers; coordination happens entirely
/// through the external queue and lock services.
pub struct SyncWorkerPool<S, P, L, E, R, Q> {
    syncer: Arc<Syncer<S, P, L, E, R>>,
    queue: Q,
    concurrency: usize,
    shutdown_rx: ShutdownRx,
}

impl<S, P, L, E, R, Q> SyncWorkerPool<S, P, L, E, R, Q>
where
    S: ItemStore + TransactionStore + Send + Sync + 'static,
    P: ProviderClient + Send + Sync + 'static,
    L: SyncLock + Send + Sync + 'static,
    E: EventPublisher + Send + Sync + 'static,
    R: RateLimiter + Send + Sync + 'static,
    Q: JobQueue + Clone + Send + Sync + 'static,
{
    pub fn new(
        syncer: Syncer<S, P, L, E, R>,
        queue: Q,
        concurrency: usize,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            syncer: Arc::new(syncer),
            queue,
            concurrency,
            shutdown_rx,
        }
    }

    /// Spawns the workers and returns a handle for awaiting their exit.
    pub fn start(self) -> SyncWorkerPoolHandle {
        info!(concurrency = self.concurrency, "starting sync workers");

        let handles = (0..self.concurrency)
            .map(|worker_id| {
                let syncer = self.syncer.clone();
                let queue = self.queue.clone();
                let shutdown_rx = self.shutdown_rx.clone();

                let span = tracing::info_span!("sync_worker", worker_id);
                tokio::spawn(run_worker(syncer, queue, shutdown_rx).instrument(span))
            })
            .collect();

        SyncWorkerPoolHandle { handles }
    }
}

async fn run_worker<S, P, L, E, R, Q>(
    syncer: Arc<Syncer<S, P, L, E, R>>,
    queue: Q,
    mut shutdown_rx: ShutdownRx,
) where
    S: ItemStore + TransactionStore + Sync,
    P: ProviderClient + Sync,
    L: SyncLock + Sync,
    E: EventPublisher + Sync,
    R: RateLimiter,
    Q: JobQueue,
{
    loop {
        if is_shutdown(&shutdown_rx) {
            debug!("worker stopping on shutdown");
            return;
        }

        let job = tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!("worker stopping on shutdown");
                return;
            }
            result = queue.dequeue(DEQUEUE_TIMEOUT) => match result {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(err) => {
                    error!(error = %err, "queue dequeue failed");
                    tokio::time::sleep(QUEUE_ERROR_BACKOFF).await;
                    continue;
                }
            },
        };

        let span = tracing::info_span!(
            "sync_job",
            item_id = %job.item_id,
            trace_id = %job.trace_id,
            job_type = ?job.job_type,
        );
        async {
            info!("processing sync job");
            match syncer.sync_item(job.item_id, &mut shutdown_rx).await {
                Ok(()) => info!("sync completed"),
                Err(err) if err.is_lock_busy() => {
                    // Duplicate job; another worker owns the item.
                    debug!("item is being synced by another worker, dropping job");
                }
                Err(err) if matches!(err.kind(), ErrorKind::Cancelled) => {
                    debug!("sync cancelled by shutdown");
                }
                Err(err) => {
                    error!(error = %err, retryable = err.is_retryable(), "sync failed");
                }
            }
        }
        .instrument(span)
        .await;
    }
}

/// Handle for awaiting worker pool termination.
pub struct SyncWorkerPoolHandle {
    handles: Vec<JoinHandle<()>>,
}

impl SyncWorkerPoolHandle {
    /// Waits for every worker to exit.
    ///
    /// Panics inside a worker surface as `WorkerPanicked`; the remaining
    /// workers are still awaited.
    pub async fn wait(self) -> RelayResult<()> {
        let mut first_error = None;

        for (worker_id, handle) in self.handles.into_iter().enumerate() {
            if let Err(err) = handle.await {
                error!(worker_id, error = %err, "worker task failed");
                if first_error.is_none() {
                    first_error = Some(RelayError::with_source(
                        ErrorKind::WorkerPanicked { worker_id },
                        err,
                    ));
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
