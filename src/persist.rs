//! Background persistence of refreshed bank records
//!
//! Lookups hand freshly normalized batches to a worker task over a bounded
//! channel and move on. The worker upserts each batch into the store and
//! reports the outcome on its own event channel and through tracing, so a
//! failed write never reaches the caller of a lookup.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::BankStore;
use crate::data::BankRecord;

/// Capacity of the event channel
const EVENT_CAPACITY: usize = 32;

/// Messages sent from the worker after each job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistEvent {
    /// A batch was processed; `failed` records could not be written
    Completed { written: usize, failed: usize },
    /// A batch could not be processed at all
    Failed(String),
}

/// Configuration for the persistence worker
#[derive(Debug, Clone)]
pub struct PersistConfig {
    /// Number of batches that may wait for the worker
    pub queue_capacity: usize,
    /// Bound on a single batch write
    pub write_timeout: Duration,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// A batch waiting to be written
#[derive(Debug)]
struct PersistJob {
    records: Vec<BankRecord>,
}

/// Submission side of the worker, cheap to clone
#[derive(Debug, Clone)]
pub struct PersistQueue {
    jobs: mpsc::Sender<PersistJob>,
}

impl PersistQueue {
    /// Queues a batch for upsert without waiting
    ///
    /// Returns `false` if the batch was dropped because the queue is full or
    /// the worker has stopped. Dropping is logged and never fatal.
    pub fn submit(&self, records: Vec<BankRecord>) -> bool {
        if records.is_empty() {
            return true;
        }
        let count = records.len();
        match self.jobs.try_send(PersistJob { records }) {
            Ok(()) => {
                debug!(count, "queued batch for persistence");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(count, "persistence queue full, dropping batch");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(count, "persistence worker stopped, dropping batch");
                false
            }
        }
    }
}

/// Handle for observing and draining the worker
pub struct PersistWorker {
    /// Channel for receiving job outcomes
    pub events: mpsc::Receiver<PersistEvent>,
    handle: JoinHandle<()>,
}

impl PersistWorker {
    /// Waits for the worker to finish every queued job
    ///
    /// Completes once all `PersistQueue` clones have been dropped.
    pub async fn finish(self) {
        if let Err(e) = self.handle.await {
            error!(error = %e, "persistence worker panicked");
        }
    }
}

/// Spawns the persistence worker
///
/// The worker runs on its own task, so cancelling the request that queued a
/// batch does not cancel the write.
pub fn spawn(store: Arc<dyn BankStore>, config: PersistConfig) -> (PersistQueue, PersistWorker) {
    let (job_tx, mut job_rx) = mpsc::channel::<PersistJob>(config.queue_capacity.max(1));
    let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
    let write_timeout = config.write_timeout;

    let handle = tokio::spawn(async move {
        while let Some(job) = job_rx.recv().await {
            let total = job.records.len();
            let event =
                match tokio::time::timeout(write_timeout, store.upsert_all(&job.records)).await {
                    Ok(report) => {
                        let failed = report.failed.len();
                        if failed == 0 {
                            info!(written = report.written, "persisted refreshed banks");
                        } else {
                            warn!(
                                written = report.written,
                                failed, "persisted refreshed banks with failures"
                            );
                        }
                        PersistEvent::Completed {
                            written: report.written,
                            failed,
                        }
                    }
                    Err(_) => {
                        error!(count = total, "persisting refreshed banks timed out");
                        PersistEvent::Failed(format!("write of {} records timed out", total))
                    }
                };
            // Nobody may be listening; outcomes are already logged
            let _ = event_tx.try_send(event);
        }
        debug!("persistence worker stopped");
    });

    (
        PersistQueue { jobs: job_tx },
        PersistWorker {
            events: event_rx,
            handle,
        },
    )
}
