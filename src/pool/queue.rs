//! Task and result queues
//!
//! The task queue is an unbounded crossbeam channel that the coordinator
//! fills completely before any worker starts. Workers only ever pop with
//! `try_dequeue`, so an empty queue means the supply is exhausted rather
//! than "wait for more".
//!
//! The result queue is the multi-producer, single-consumer side: each
//! worker owns a `ResultSender` clone and the coordinator holds the only
//! `ResultReceiver`. Once every sender is dropped the receiver observes a
//! disconnect, which lets counted collection detect a worker that died
//! without flushing.

use crate::pool::PartialResult;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Statistics for the task queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total items enqueued
    pub enqueued: AtomicU64,

    /// Total items handed to a worker
    pub dequeued: AtomicU64,
}

impl QueueStats {
    /// Items handed out so far
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Items enqueued so far
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}

/// Shared task queue
pub struct TaskQueue<I> {
    /// Sender for adding items; dropped by `seal`
    sender: Option<Sender<I>>,

    /// Receiver for taking items
    receiver: Receiver<I>,

    /// Queue statistics
    stats: Arc<QueueStats>,
}

impl<I> TaskQueue<I> {
    /// Create an empty task queue
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();

        Self {
            sender: Some(sender),
            receiver,
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Add an item to the queue
    ///
    /// Never blocks. Items enqueued after `seal` are ignored.
    pub fn enqueue(&self, item: I) {
        if let Some(ref sender) = self.sender {
            // The queue owns a receiver, so the channel cannot be disconnected
            if sender.send(item).is_ok() {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Enqueue every item from an iterator, returning how many were added
    pub fn enqueue_all(&self, items: impl IntoIterator<Item = I>) -> usize {
        let before = self.stats.enqueued_count();
        for item in items {
            self.enqueue(item);
        }
        (self.stats.enqueued_count() - before) as usize
    }

    /// Close the producer side; no further items can be added
    pub fn seal(&mut self) {
        self.sender = None;
    }

    /// Get a consumer handle for this queue (one per worker)
    pub fn handle(&self) -> TaskQueueHandle<I> {
        TaskQueueHandle {
            receiver: self.receiver.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Approximate number of queued items (progress display only)
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if the queue is empty (advisory under concurrency)
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<I> Default for TaskQueue<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker-side handle for popping items
pub struct TaskQueueHandle<I> {
    receiver: Receiver<I>,
    stats: Arc<QueueStats>,
}

impl<I> Clone for TaskQueueHandle<I> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<I> TaskQueueHandle<I> {
    /// Take the next item without blocking
    ///
    /// Returns `None` when the queue is empty. A given item is returned to
    /// at most one caller.
    pub fn try_dequeue(&self) -> Option<I> {
        match self.receiver.try_recv() {
            Ok(item) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(item)
            }
            Err(_) => None,
        }
    }

    /// Approximate number of queued items
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// What a blocking read on the result queue produced
#[derive(Debug)]
pub enum Collected<R> {
    /// A partial result arrived
    Partial(PartialResult<R>),
    /// Nothing arrived within the timeout
    Idle,
    /// Every sender is gone; nothing more can arrive
    Disconnected,
}

/// Create a result queue: one sender to clone into workers, one receiver
pub fn result_queue<R>() -> (ResultSender<R>, ResultReceiver<R>) {
    let (sender, receiver) = unbounded();
    (ResultSender { sender }, ResultReceiver { receiver })
}

/// Handle for publishing partial results
pub struct ResultSender<R> {
    sender: Sender<PartialResult<R>>,
}

impl<R> Clone for ResultSender<R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<R> ResultSender<R> {
    /// Publish a partial result
    ///
    /// Fails only if the coordinator has stopped collecting and dropped the
    /// receiver.
    pub fn publish(&self, partial: PartialResult<R>) -> Result<(), PartialResult<R>> {
        self.sender.send(partial).map_err(|e| e.into_inner())
    }
}

/// Coordinator-side handle for reading partial results
pub struct ResultReceiver<R> {
    receiver: Receiver<PartialResult<R>>,
}

impl<R> ResultReceiver<R> {
    /// Block until a partial result arrives or all senders are dropped
    pub fn recv(&self) -> Collected<R> {
        match self.receiver.recv() {
            Ok(partial) => Collected::Partial(partial),
            Err(_) => Collected::Disconnected,
        }
    }

    /// Take a partial result already in the channel, without blocking
    pub fn try_recv(&self) -> Collected<R> {
        match self.receiver.try_recv() {
            Ok(partial) => Collected::Partial(partial),
            Err(TryRecvError::Empty) => Collected::Idle,
            Err(TryRecvError::Disconnected) => Collected::Disconnected,
        }
    }

    /// Block for at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Collected<R> {
        match self.receiver.recv_timeout(timeout) {
            Ok(partial) => Collected::Partial(partial),
            Err(RecvTimeoutError::Timeout) => Collected::Idle,
            Err(RecvTimeoutError::Disconnected) => Collected::Disconnected,
        }
    }
}
