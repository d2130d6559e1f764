//! Pool coordinator - orchestrates one enqueue/spawn/collect/merge run
//!
//! The coordinator is responsible for:
//! - Filling the task queue completely before any worker starts
//! - Spawning exactly N workers bound to the task and result queues
//! - Draining the result queue with the configured completion strategy
//! - Merging partial results and reporting final statistics
//!
//! Phases run strictly in order: INIT → ENQUEUE → SPAWN → COLLECT → MERGE →
//! DONE. Any error moves the run to FAILED.

use crate::config::{CollectStrategy, FlushMode, PoolConfig};
use crate::error::{Result, WorkerError};
use crate::pool::queue::{result_queue, Collected, ResultReceiver, ResultSender, TaskQueue};
use crate::pool::transform::{Transform, WorkItem};
use crate::pool::worker::{aggregate_stats, Worker, WorkerTotals};
use crate::pool::{merge_partials, PartialResult};
use crate::progress::ProgressReporter;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often the counted strategy wakes up to refresh progress
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Enqueue,
    Spawn,
    Collect,
    Merge,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "INIT",
            Phase::Enqueue => "ENQUEUE",
            Phase::Spawn => "SPAWN",
            Phase::Collect => "COLLECT",
            Phase::Merge => "MERGE",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Why the COLLECT phase stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectEnd {
    /// Counted strategy read one result per worker
    AllReceived,
    /// Idle-timeout strategy saw a quiet period
    Idle,
    /// Every worker dropped its sender
    Disconnected,
}

/// Result of a completed pool run
#[derive(Debug)]
pub struct PoolResult<R> {
    /// Merged records, in arrival order of the partial results
    pub records: Vec<R>,

    /// Items placed on the task queue
    pub items_enqueued: usize,

    /// Items taken off the queue by workers
    pub items_processed: u64,

    /// Items whose transform failed
    pub failures: u64,

    /// Partial results read from the result queue
    pub partials_received: usize,

    /// Workers still running when idle-timeout collection ended
    pub truncated_workers: Vec<usize>,

    /// Workers that panicked
    pub crashed_workers: Vec<usize>,

    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,

    /// Time taken for the run
    pub duration: Duration,

    /// Whether every worker's results made it into `records`
    pub completed: bool,
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct PoolProgress {
    /// Items taken by workers so far
    pub items_processed: u64,

    /// Items enqueued in total
    pub total_items: usize,

    /// Records produced so far
    pub records: u64,

    /// Failed items so far
    pub failures: u64,

    /// Partial results received
    pub partials: usize,

    /// Items still queued (approximate)
    pub queue_size: usize,

    /// Total workers
    pub total_workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl PoolProgress {
    /// Calculate items per second rate
    pub fn items_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.items_processed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates one parallel run over a fixed list of work items
pub struct Coordinator<I, T>
where
    I: WorkItem,
    T: Transform<I>,
{
    /// Configuration
    config: Arc<PoolConfig>,

    /// Transform shared by every worker
    transform: Arc<T>,

    /// Task queue
    queue: TaskQueue<I>,

    /// Worker threads
    workers: Vec<Worker>,

    /// Current phase
    phase: Phase,

    /// Optional progress display
    progress: Option<ProgressReporter>,

    /// Run start time
    start_time: Option<Instant>,

    _item: PhantomData<fn(I)>,
}

impl<I, T> Coordinator<I, T>
where
    I: WorkItem,
    T: Transform<I>,
{
    /// Create a new coordinator
    pub fn new(config: PoolConfig, transform: T) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            transform: Arc::new(transform),
            queue: TaskQueue::new(),
            workers: Vec::new(),
            phase: Phase::Init,
            progress: None,
            start_time: None,
            _item: PhantomData,
        })
    }

    /// Attach a progress reporter, updated as partial results arrive
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the pool over `items`
    pub fn run(mut self, items: impl IntoIterator<Item = I>) -> Result<PoolResult<T::Record>> {
        let started_at = Utc::now();
        let start_time = Instant::now();
        self.start_time = Some(start_time);

        info!(
            workers = self.config.worker_count,
            strategy = self.config.collect.name(),
            started_at = %started_at.to_rfc3339(),
            "Starting pool run"
        );

        match self.run_phases(items, started_at, start_time) {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(phase = %self.phase, error = %e, "Pool run failed");
                self.transition(Phase::Failed);
                if let Some(ref p) = self.progress {
                    p.finish("Run failed");
                }
                Err(e)
            }
        }
    }

    fn run_phases(
        &mut self,
        items: impl IntoIterator<Item = I>,
        started_at: DateTime<Utc>,
        start_time: Instant,
    ) -> Result<PoolResult<T::Record>> {
        self.transition(Phase::Enqueue);
        let items_enqueued = self.queue.enqueue_all(items);
        self.queue.seal();
        info!(items = items_enqueued, "Task queue filled");

        self.transition(Phase::Spawn);
        let (sender, receiver) = result_queue();
        self.spawn_workers(&sender)?;
        // Only workers hold senders now, so the channel disconnects once they all exit
        drop(sender);

        self.transition(Phase::Collect);
        let (mut partials, end) = match self.collect(&receiver, items_enqueued) {
            Ok(collected) => collected,
            Err(e) => {
                // Every sender is gone, so joining cannot block
                self.join_workers(CollectEnd::Disconnected, &[], &HashSet::new());
                return Err(e.into());
            }
        };
        let finished = if end == CollectEnd::Idle {
            settle_after_idle(&self.workers, &receiver, &mut partials)
        } else {
            HashSet::new()
        };
        let (crashed_workers, truncated_workers) = self.join_workers(end, &partials, &finished);
        let totals = aggregate_stats(&self.workers);
        drop(receiver);

        self.transition(Phase::Merge);
        let partials_received = partials.len();
        let records = merge_partials(partials);

        let duration = start_time.elapsed();
        let completed = truncated_workers.is_empty() && crashed_workers.is_empty();

        self.transition(Phase::Done);
        info!(
            items = totals.items_processed,
            dequeued = self.queue.stats().throughput(),
            records = records.len(),
            failures = totals.failures,
            partials = partials_received,
            duration_ms = duration.as_millis() as u64,
            "Pool run completed"
        );

        if let Some(ref p) = self.progress {
            p.finish(if completed {
                "Run completed"
            } else {
                "Run completed with lost results"
            });
        }

        Ok(PoolResult {
            records,
            items_enqueued,
            items_processed: totals.items_processed,
            failures: totals.failures,
            partials_received,
            truncated_workers,
            crashed_workers,
            started_at,
            duration,
            completed,
        })
    }

    fn transition(&mut self, next: Phase) {
        debug!(from = %self.phase, to = %next, "Coordinator phase change");
        self.phase = next;
    }

    /// Spawn worker threads
    fn spawn_workers(&mut self, sender: &ResultSender<T::Record>) -> Result<()> {
        for id in 0..self.config.worker_count {
            let worker = Worker::spawn(
                id,
                Arc::clone(&self.config),
                self.queue.handle(),
                sender.clone(),
                Arc::clone(&self.transform),
            )?;

            self.workers.push(worker);
        }

        info!(count = self.workers.len(), "Workers spawned");
        Ok(())
    }

    fn collect(
        &self,
        receiver: &ResultReceiver<T::Record>,
        total_items: usize,
    ) -> std::result::Result<(Vec<PartialResult<T::Record>>, CollectEnd), WorkerError> {
        match self.config.collect {
            CollectStrategy::Counted => {
                let partials = self.collect_counted(receiver, total_items)?;
                Ok((partials, CollectEnd::AllReceived))
            }
            CollectStrategy::IdleTimeout(timeout) => {
                Ok(self.collect_idle(receiver, timeout, total_items))
            }
        }
    }

    /// Read exactly one partial result per spawned worker
    ///
    /// A disconnect before all N arrive means some worker exited without
    /// flushing; that is reported instead of waiting forever.
    fn collect_counted(
        &self,
        receiver: &ResultReceiver<T::Record>,
        total_items: usize,
    ) -> std::result::Result<Vec<PartialResult<T::Record>>, WorkerError> {
        let expected = self.workers.len();
        let mut partials = Vec::with_capacity(expected);

        while partials.len() < expected {
            match receiver.recv_timeout(PROGRESS_INTERVAL) {
                Collected::Partial(partial) => {
                    debug!(
                        worker = partial.worker_id,
                        records = partial.len(),
                        received = partials.len() + 1,
                        expected = expected,
                        "Partial result received"
                    );
                    partials.push(partial);
                    self.report_progress(&partials, total_items);
                }
                Collected::Idle => self.report_progress(&partials, total_items),
                Collected::Disconnected => {
                    return Err(WorkerError::MissingResults {
                        received: partials.len(),
                        expected,
                    });
                }
            }
        }

        Ok(partials)
    }

    /// Read until no partial result arrives for `timeout`
    ///
    /// Collection also ends early once every worker has exited. A worker
    /// still busy when the quiet period elapses loses its results.
    fn collect_idle(
        &self,
        receiver: &ResultReceiver<T::Record>,
        timeout: Duration,
        total_items: usize,
    ) -> (Vec<PartialResult<T::Record>>, CollectEnd) {
        let mut partials = Vec::new();

        let end = loop {
            match receiver.recv_timeout(timeout) {
                Collected::Partial(partial) => {
                    debug!(
                        worker = partial.worker_id,
                        records = partial.len(),
                        received = partials.len() + 1,
                        "Partial result received"
                    );
                    partials.push(partial);
                    self.report_progress(&partials, total_items);
                }
                Collected::Idle => {
                    debug!(timeout_ms = timeout.as_millis() as u64, "Result queue idle");
                    break CollectEnd::Idle;
                }
                Collected::Disconnected => {
                    debug!("All workers exited");
                    break CollectEnd::Disconnected;
                }
            }
        };

        (partials, end)
    }

    /// Join finished workers and detach any still running
    ///
    /// Only an idle-timeout end can leave a worker mid-drain. `finished` holds
    /// the workers that had exited before the channel was settled; a worker
    /// whose exit flush already arrived is past its last send and is joined.
    /// Returns (crashed, truncated) worker ids.
    fn join_workers(
        &mut self,
        end: CollectEnd,
        partials: &[PartialResult<T::Record>],
        finished: &HashSet<usize>,
    ) -> (Vec<usize>, Vec<usize>) {
        let flushed: HashSet<usize> = if self.config.flush_mode == FlushMode::OnExit {
            partials.iter().map(|p| p.worker_id).collect()
        } else {
            HashSet::new()
        };

        let mut crashed = Vec::new();
        let mut truncated = Vec::new();

        for worker in &mut self.workers {
            let id = worker.id();

            if end == CollectEnd::Idle && !flushed.contains(&id) && !finished.contains(&id) {
                warn!(worker = id, "Worker still running at end of collection, its results are lost");
                truncated.push(id);
                worker.detach();
                continue;
            }

            match worker.join() {
                Ok(()) => {}
                Err(WorkerError::Panicked { id, message }) => {
                    warn!(worker = id, message = %message, "Worker panicked before flushing");
                    crashed.push(id);
                }
                Err(e) => warn!(worker = id, error = %e, "Worker failed to join cleanly"),
            }
        }

        (crashed, truncated)
    }

    fn report_progress(&self, partials: &[PartialResult<T::Record>], total_items: usize) {
        let Some(ref reporter) = self.progress else {
            return;
        };
        let totals: WorkerTotals = aggregate_stats(&self.workers);
        let elapsed = self.start_time.map(|t| t.elapsed()).unwrap_or_default();

        reporter.update(&PoolProgress {
            items_processed: totals.items_processed,
            total_items,
            records: totals.records_emitted,
            failures: totals.failures,
            partials: partials.len(),
            queue_size: self.queue.len(),
            total_workers: self.config.worker_count,
            elapsed,
        });
    }
}

/// Note which workers have exited, then take every partial result already sent
///
/// A worker that exited before the drain has nothing left to send, so all of
/// its results are in `partials` afterwards.
fn settle_after_idle<R>(
    workers: &[Worker],
    receiver: &ResultReceiver<R>,
    partials: &mut Vec<PartialResult<R>>,
) -> HashSet<usize> {
    let finished: HashSet<usize> = workers
        .iter()
        .filter(|w| w.is_finished())
        .map(Worker::id)
        .collect();

    while let Collected::Partial(partial) = receiver.try_recv() {
        debug!(
            worker = partial.worker_id,
            records = partial.len(),
            "Partial result received after idle period"
        );
        partials.push(partial);
    }

    finished
}
