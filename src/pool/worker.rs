//! Worker thread logic for draining the task queue
//!
//! Each worker:
//! - Pops items with a non-blocking `try_dequeue` until the queue is empty
//! - Runs the shared transform on every item it receives
//! - Accumulates records locally, in processing order
//! - Publishes its accumulated records to the result queue and exits
//!
//! Workers never talk to each other; the task queue and the result queue
//! are the only things they share.

use crate::config::{FailurePolicy, FlushMode, PoolConfig};
use crate::error::{ItemOutcome, WorkerError};
use crate::pool::queue::{ResultSender, TaskQueueHandle};
use crate::pool::transform::{Transform, WorkItem};
use crate::pool::PartialResult;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Items taken from the queue
    pub items_processed: AtomicU64,

    /// Records produced by successful transforms
    pub records_emitted: AtomicU64,

    /// Items whose transform failed
    pub failures: AtomicU64,

    /// Partial results published
    pub flushes: AtomicU64,
}

impl WorkerStats {
    fn record_item(&self) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_records(&self, count: u64) {
        self.records_emitted.fetch_add(count, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }
}

/// A worker thread draining the task queue
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<Result<(), WorkerError>>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread named `harvest-<id>`
    pub fn spawn<I, T>(
        id: usize,
        config: Arc<PoolConfig>,
        queue: TaskQueueHandle<I>,
        results: ResultSender<T::Record>,
        transform: Arc<T>,
    ) -> Result<Self, WorkerError>
    where
        I: WorkItem,
        T: Transform<I>,
    {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("harvest-{}", id))
            .spawn(move || worker_loop(id, config, queue, results, transform, stats_clone))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Check whether the thread has exited (normally or by panic)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the worker to finish
    ///
    /// Statistics stay readable afterwards; joining twice is a no-op.
    pub fn join(&mut self) -> Result<(), WorkerError> {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(result) => result,
                Err(payload) => Err(WorkerError::Panicked {
                    id: self.id,
                    message: panic_message(payload.as_ref()),
                }),
            }
        } else {
            Ok(())
        }
    }

    /// Let the thread run on without waiting for it
    pub fn detach(&mut self) {
        self.handle.take();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Worker thread panicked".into()
    }
}

/// Main worker loop
fn worker_loop<I, T>(
    id: usize,
    config: Arc<PoolConfig>,
    queue: TaskQueueHandle<I>,
    results: ResultSender<T::Record>,
    transform: Arc<T>,
    stats: Arc<WorkerStats>,
) -> Result<(), WorkerError>
where
    I: WorkItem,
    T: Transform<I>,
{
    debug!(worker = id, "Worker starting");

    let mut records: Vec<T::Record> = Vec::new();
    let mut items = 0usize;

    // Empty means finished: every item was enqueued before we started
    while let Some(item) = queue.try_dequeue() {
        items += 1;
        stats.record_item();

        let outcome = process_item(&item, transform.as_ref(), config.failure_policy, &mut records);

        let label = outcome.item();
        match &outcome {
            ItemOutcome::Success { records, .. } => {
                stats.record_records(*records as u64);
                trace!(worker = id, item = %label, records = records, "Item processed");
            }
            ItemOutcome::Skipped { reason, .. } => {
                stats.record_failure();
                warn!(worker = id, item = %label, reason = %reason, "Item skipped");
            }
            ItemOutcome::Failed { error, .. } => {
                stats.record_failure();
                warn!(worker = id, item = %label, error = %error, "Item failed, flushing and stopping");
            }
        }

        if config.flush_mode == FlushMode::PerItem {
            publish(id, &results, std::mem::take(&mut records), items, &stats)?;
            items = 0;
        }

        if outcome.stops_worker() {
            break;
        }
    }

    if config.flush_mode == FlushMode::OnExit {
        publish(id, &results, records, items, &stats)?;
    }

    info!(
        worker = id,
        items = stats.items_processed.load(Ordering::Relaxed),
        records = stats.records_emitted.load(Ordering::Relaxed),
        failures = stats.failures.load(Ordering::Relaxed),
        "Worker finished"
    );

    Ok(())
}

/// Transform one item, appending its records to the local batch
fn process_item<I, T>(
    item: &I,
    transform: &T,
    policy: FailurePolicy,
    records: &mut Vec<T::Record>,
) -> ItemOutcome
where
    I: WorkItem,
    T: Transform<I>,
{
    match transform.apply(item) {
        Ok(produced) => {
            let count = produced.len();
            records.extend(produced);
            ItemOutcome::Success {
                item: item.label(),
                records: count,
            }
        }
        Err(error) => match policy {
            FailurePolicy::Skip => ItemOutcome::Skipped {
                item: item.label(),
                reason: error.to_string(),
            },
            FailurePolicy::Abort => ItemOutcome::Failed {
                item: item.label(),
                error,
            },
        },
    }
}

fn publish<R>(
    id: usize,
    results: &ResultSender<R>,
    records: Vec<R>,
    items: usize,
    stats: &WorkerStats,
) -> Result<(), WorkerError> {
    let count = records.len();
    match results.publish(PartialResult::new(id, records, items)) {
        Ok(()) => {
            stats.record_flush();
            trace!(worker = id, records = count, "Partial result published");
            Ok(())
        }
        Err(_) => {
            warn!(
                worker = id,
                records = count,
                "Coordinator stopped collecting, records dropped"
            );
            Err(WorkerError::ResultChannelClosed)
        }
    }
}

/// Totals across a set of workers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTotals {
    pub items_processed: u64,
    pub records_emitted: u64,
    pub failures: u64,
    pub flushes: u64,
}

/// Aggregate statistics from multiple workers
pub fn aggregate_stats(workers: &[Worker]) -> WorkerTotals {
    let mut totals = WorkerTotals::default();

    for worker in workers {
        totals.items_processed += worker.stats.items_processed.load(Ordering::Relaxed);
        totals.records_emitted += worker.stats.records_emitted.load(Ordering::Relaxed);
        totals.failures += worker.stats.failures.load(Ordering::Relaxed);
        totals.flushes += worker.stats.flushes.load(Ordering::Relaxed);
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransformError, TransformResult};
    use crate::pool::queue::{result_queue, Collected, TaskQueue};
    use crate::pool::transform::FnTransform;

    fn fail_on_three(n: &u32) -> TransformResult<Vec<u32>> {
        if *n == 3 {
            Err(TransformError::Malformed {
                path: "3".into(),
                reason: "bad item".into(),
            })
        } else {
            Ok(vec![*n * 10])
        }
    }

    fn run_single_worker(config: PoolConfig, items: Vec<u32>) -> (Vec<PartialResult<u32>>, Worker) {
        let queue = TaskQueue::new();
        queue.enqueue_all(items);
        let (sender, receiver) = result_queue();

        let worker = Worker::spawn(
            0,
            Arc::new(config),
            queue.handle(),
            sender,
            Arc::new(FnTransform::new(fail_on_three)),
        )
        .unwrap();

        let mut partials = Vec::new();
        while let Collected::Partial(p) = receiver.recv() {
            partials.push(p);
        }
        (partials, worker)
    }

    #[test]
    fn test_worker_stats() {
        let stats = WorkerStats::default();

        stats.record_item();
        stats.record_records(10);
        stats.record_failure();
        stats.record_flush();

        assert_eq!(stats.items_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.records_emitted.load(Ordering::Relaxed), 10);
        assert_eq!(stats.failures.load(Ordering::Relaxed), 1);
        assert_eq!(stats.flushes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_skip_policy_keeps_draining() {
        let (partials, mut worker) = run_single_worker(PoolConfig::default(), vec![1, 2, 3, 4]);

        assert_eq!(partials.len(), 1);
        assert_eq!(partials[0].records, vec![10, 20, 40]);
        assert_eq!(partials[0].items, 4);
        assert_eq!(worker.stats().failures.load(Ordering::Relaxed), 1);
        worker.join().unwrap();
    }

    #[test]
    fn test_abort_policy_flushes_accumulated() {
        let config = PoolConfig::default().with_failure_policy(FailurePolicy::Abort);
        let (partials, mut worker) = run_single_worker(config, vec![1, 2, 3, 4]);

        assert_eq!(partials.len(), 1);
        assert_eq!(partials[0].records, vec![10, 20]);
        assert_eq!(partials[0].items, 3);
        worker.join().unwrap();
    }

    #[test]
    fn test_empty_queue_still_flushes_once() {
        let (partials, mut worker) = run_single_worker(PoolConfig::default(), vec![]);

        assert_eq!(partials.len(), 1);
        assert!(partials[0].is_empty());
        assert_eq!(partials[0].items, 0);
        worker.join().unwrap();
    }

    #[test]
    fn test_per_item_flush() {
        let config = PoolConfig::default().with_flush_mode(FlushMode::PerItem);
        let (partials, mut worker) = run_single_worker(config, vec![1, 2, 3]);

        assert_eq!(partials.len(), 3);
        assert_eq!(partials[0].records, vec![10]);
        assert!(partials[2].is_empty());
        assert_eq!(worker.stats().flushes.load(Ordering::Relaxed), 3);
        worker.join().unwrap();
    }

    #[test]
    fn test_panicking_transform_reports_panic() {
        let queue = TaskQueue::new();
        queue.enqueue(1u32);
        let (sender, receiver) = result_queue();

        let mut worker = Worker::spawn(
            7,
            Arc::new(PoolConfig::default()),
            queue.handle(),
            sender,
            Arc::new(FnTransform::new(|_: &u32| -> TransformResult<Vec<u32>> {
                panic!("boom")
            })),
        )
        .unwrap();

        assert!(matches!(receiver.recv(), Collected::Disconnected));
        match worker.join() {
            Err(WorkerError::Panicked { id, message }) => {
                assert_eq!(id, 7);
                assert_eq!(message, "boom");
            }
            other => panic!("expected panic, got {:?}", other),
        }
    }
}
