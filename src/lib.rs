//! harvester - parallel batch processing on a bounded worker pool
//!
//! Every work item is placed on a task queue up front, then a fixed number
//! of worker threads drain it. Each worker applies the same transform to the
//! items it takes and publishes what it produced to a result queue. The
//! coordinator collects those partial results and merges them into one
//! artifact.
//!
//! # Pipelines
//!
//! - **filter**: JSON-lines files in, records without a sentinel field value
//!   out, written as one JSON array.
//!
//! - **scrape**: downloaded HTML pages in, `<category, regex>` rows out,
//!   written as a fully quoted CSV. With the `download` feature the pages
//!   can be re-fetched from a `category,url` table first.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Coordinator                              │
//! │   INIT → ENQUEUE → SPAWN → COLLECT → MERGE → DONE   (→ FAILED)   │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ enqueue every item, then seal
//!                               ▼
//!                  ┌──────────────────────────┐
//!                  │       Task Queue         │
//!                  │  (crossbeam unbounded)   │
//!                  │  empty == end of supply  │
//!                  └────────────┬─────────────┘
//!        ┌──────────────────────┼──────────────────────┐
//!        ▼                      ▼                      ▼
//!   ┌─────────┐            ┌─────────┐            ┌─────────┐
//!   │Worker 0 │            │Worker 1 │    ...     │Worker N │
//!   │transform│            │transform│            │transform│
//!   └────┬────┘            └────┬────┘            └────┬────┘
//!        └──────────────────────┼──────────────────────┘
//!                               ▼
//!                  ┌──────────────────────────┐
//!                  │      Result Queue        │
//!                  │ counted | idle-timeout   │
//!                  └────────────┬─────────────┘
//!                               ▼
//!                    ┌──────────────────┐
//!                    │  JSON / CSV file │
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Drop GitHub launches from the mybinder logs with 4 workers
//! harvester -n 4 filter data/ -o q4.json
//!
//! # Scrape regexes from downloaded pages, stopping after 1s of silence
//! harvester -n 8 --collect idle-timeout scrape --html-dir downloaded_html -o regexes.csv
//! ```

pub mod config;
pub mod error;
pub mod jobs;
pub mod output;
pub mod pool;
pub mod progress;

pub use config::{CliArgs, CollectStrategy, FailurePolicy, FlushMode, JobConfig, PoolConfig};
pub use error::{HarvestError, Result};
pub use jobs::{run_filter, run_scrape, JobReport};
pub use pool::{Coordinator, PoolResult, Transform, WorkItem};
