//! Error types for harvester
//!
//! This module defines the error hierarchy for:
//! - Per-item transform failures (recoverable, logged by the worker)
//! - Worker thread failures (panics, missing results)
//! - Configuration and CLI errors
//! - Output artifact serialization
//!
//! An empty task queue is not an error: `TaskQueue::try_dequeue` returns
//! `None` and the worker treats it as the end of its supply.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the harvester
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Transform errors that escaped a pipeline (INIT-time source listing etc.)
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Output artifact errors
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// I/O errors (directory listing, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while transforming a single work item
#[derive(Error, Debug)]
pub enum TransformError {
    /// Could not open or read the named resource
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not store a fetched resource
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of a JSON-lines document did not parse
    #[error("Invalid JSON in '{path}' at line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Document was readable but not in the expected shape
    #[error("Malformed document '{path}': {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// Content was not valid UTF-8
    #[error("Encoding error in '{path}': {reason}")]
    Encoding { path: PathBuf, reason: String },

    /// Remote fetch failed
    #[error("Failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },
}

impl TransformError {
    /// Label of the item that failed (path or URL)
    pub fn item(&self) -> String {
        match self {
            TransformError::Read { path, .. }
            | TransformError::Write { path, .. }
            | TransformError::Json { path, .. }
            | TransformError::Malformed { path, .. }
            | TransformError::Encoding { path, .. } => path.display().to_string(),
            TransformError::Fetch { url, .. } => url.clone(),
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Idle timeout of zero would end collection immediately
    #[error("Invalid idle timeout: must be greater than zero")]
    InvalidIdleTimeout,

    /// Per-item flush produces more messages than workers
    #[error("Per-item flush requires idle-timeout collection (counted expects one result per worker)")]
    FlushRequiresIdleTimeout,

    /// Invalid skip pattern
    #[error("Invalid skip pattern '{pattern}': {reason}")]
    InvalidSkipPattern { pattern: String, reason: String },

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },

    /// Input path error
    #[error("Invalid input path '{path}': {reason}")]
    InvalidInputPath { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker initialization failed
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Result channel disconnected before every worker flushed
    #[error("Result channel closed after {received} of {expected} partial results (a worker exited without flushing)")]
    MissingResults { received: usize, expected: usize },

    /// Result channel closed while a worker was still publishing
    #[error("Result channel closed unexpectedly")]
    ResultChannelClosed,
}

/// Output artifact errors
#[derive(Error, Debug)]
pub enum OutputError {
    /// Could not create the output file
    #[error("Failed to create '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error while flushing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for HarvestError
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for TransformError
pub type TransformResult<T> = std::result::Result<T, TransformError>;

/// Result type alias for OutputError
pub type OutputResult<T> = std::result::Result<T, OutputError>;

/// Represents the outcome of transforming a single work item
#[derive(Debug)]
pub enum ItemOutcome {
    /// Successfully transformed the item
    Success { item: String, records: usize },

    /// Failed and skipped; the worker keeps draining
    Skipped { item: String, reason: String },

    /// Failed and the worker stops dequeuing
    Failed { item: String, error: TransformError },
}

impl ItemOutcome {
    /// Returns true if the worker should stop after this item
    pub fn stops_worker(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }

    /// Returns the item label associated with this outcome
    pub fn item(&self) -> &str {
        match self {
            ItemOutcome::Success { item, .. } => item,
            ItemOutcome::Skipped { item, .. } => item,
            ItemOutcome::Failed { item, .. } => item,
        }
    }
}
