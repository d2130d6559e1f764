//! Bounded worker pool
//!
//! A fixed set of worker threads drain a task queue that is filled
//! completely before they start. Each worker applies the shared transform
//! and publishes its records to the result queue; the coordinator merges
//! what arrives.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │      Coordinator        │
//!                     │  ENQUEUE all → SPAWN N  │
//!                     └───────────┬─────────────┘
//!                                 │
//!                        ┌────────▼────────┐
//!                        │   Task Queue    │
//!                        │ try_dequeue()   │
//!                        └────────┬────────┘
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 0 │             │  Worker 1 │             │  Worker N │
//! │ transform │             │ transform │             │ transform │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       └─────────────────────────┼─────────────────────────┘
//!                        ┌────────▼────────┐
//!                        │  Result Queue   │
//!                        │ one batch/worker│
//!                        └────────┬────────┘
//!                                 ▼
//!                     COLLECT (counted | idle-timeout) → MERGE
//! ```

pub mod coordinator;
pub mod merge;
pub mod queue;
pub mod transform;
pub mod worker;

pub use coordinator::{Coordinator, Phase, PoolProgress, PoolResult};
pub use merge::{group_by_key, merge_partials, PartialResult};
pub use queue::{result_queue, Collected, ResultReceiver, ResultSender, TaskQueue, TaskQueueHandle};
pub use transform::{FnTransform, Transform, WorkItem};
pub use worker::{aggregate_stats, Worker, WorkerStats, WorkerTotals};
