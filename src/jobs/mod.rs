//! Pipelines built on the worker pool
//!
//! - `filter`: JSON-lines files → records without the sentinel → JSON array
//! - `scrape`: HTML pages → `<category, regex>` rows → quoted CSV
//!
//! The scrape pipeline can first re-fetch its pages with a separate pool run.

#[cfg(feature = "download")]
pub mod download;
pub mod json_filter;
pub mod regex_scrape;

use crate::config::{FilterConfig, PoolConfig, ScrapeConfig};
use crate::error::{ConfigError, Result};
use crate::output::{write_json_array, write_regex_csv};
use crate::pool::{Coordinator, PoolResult, Transform, WorkItem};
use crate::progress::ProgressReporter;
use json_filter::{discover_inputs, JsonFilter};
use regex_scrape::{discover_tasks, RegexScraper};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of one pipeline, for the final summary
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Pipeline name
    pub pipeline: &'static str,

    /// Items processed by workers
    pub items: u64,

    /// Records written to the artifact
    pub records: usize,

    /// Items that failed to transform
    pub failures: u64,

    /// Workers whose results never reached the merge
    pub lost_workers: usize,

    /// Time spent in the pool runs
    pub duration: Duration,

    /// Written artifact
    pub output_path: PathBuf,

    /// Artifact size in bytes
    pub output_size: u64,

    /// Whether every worker's results were merged
    pub completed: bool,
}

/// Run one pool, attaching a fresh progress display when enabled
fn run_pool<I, T>(pool: &PoolConfig, transform: T, items: Vec<I>) -> Result<PoolResult<T::Record>>
where
    I: WorkItem,
    T: Transform<I>,
{
    let mut coordinator = Coordinator::new(pool.clone(), transform)?;
    if pool.show_progress {
        let reporter = ProgressReporter::new();
        reporter.set_status(&format!("Queueing {} items...", items.len()));
        coordinator = coordinator.with_progress(reporter);
    }
    coordinator.run(items)
}

fn lost_workers<R>(result: &PoolResult<R>) -> usize {
    result.truncated_workers.len() + result.crashed_workers.len()
}

/// Filter every `*.json` file under the input directory into one JSON array
pub fn run_filter(pool: &PoolConfig, config: &FilterConfig) -> Result<JobReport> {
    let inputs = discover_inputs(&config.input_dir, |p| config.is_skipped(p))?;
    info!(
        files = inputs.len(),
        dir = %config.input_dir.display(),
        "Discovered input files"
    );

    let filter = JsonFilter::new(config.field.clone(), config.exclude_value.clone());
    let result = run_pool(pool, filter, inputs)?;

    let output_size = write_json_array(&config.output_path, &result.records)?;
    info!(
        records = result.records.len(),
        path = %config.output_path.display(),
        "JSON output written"
    );

    Ok(JobReport {
        pipeline: "filter",
        items: result.items_processed,
        records: result.records.len(),
        failures: result.failures,
        lost_workers: lost_workers(&result),
        duration: result.duration,
        output_path: config.output_path.clone(),
        output_size,
        completed: result.completed,
    })
}

/// Scrape regex rows from the HTML tree into a CSV, re-fetching it first if asked
pub fn run_scrape(pool: &PoolConfig, config: &ScrapeConfig) -> Result<JobReport> {
    let mut items = 0;
    let mut failures = 0;
    let mut lost = 0;
    let mut duration = Duration::ZERO;

    if config.redownload {
        let fetched = redownload(pool, config)?;
        items += fetched.items_processed;
        failures += fetched.failures;
        lost += lost_workers(&fetched);
        duration += fetched.duration;
    }

    let tasks = discover_tasks(&config.html_dir)?;
    info!(
        pages = tasks.len(),
        dir = %config.html_dir.display(),
        "Discovered HTML pages"
    );

    let result = run_pool(pool, RegexScraper::new(), tasks)?;
    items += result.items_processed;
    failures += result.failures;
    lost += lost_workers(&result);
    duration += result.duration;

    let output_size = write_regex_csv(&config.output_path, &result.records)?;
    info!(
        rows = result.records.len(),
        path = %config.output_path.display(),
        "CSV output written"
    );

    Ok(JobReport {
        pipeline: "scrape",
        items,
        records: result.records.len(),
        failures,
        lost_workers: lost,
        duration,
        output_path: config.output_path.clone(),
        output_size,
        completed: lost == 0,
    })
}

#[cfg(feature = "download")]
fn redownload(pool: &PoolConfig, config: &ScrapeConfig) -> Result<PoolResult<PathBuf>> {
    use crate::error::TransformError;
    use download::{plan_downloads, read_url_table, PageFetcher};

    let Some(ref input_csv) = config.input_csv else {
        return Err(ConfigError::InvalidInputPath {
            path: config.html_dir.clone(),
            reason: "--redownload needs an input CSV".to_string(),
        }
        .into());
    };

    if config.html_dir.exists() {
        warn!(dir = %config.html_dir.display(), "Removing previously downloaded pages");
        std::fs::remove_dir_all(&config.html_dir)?;
    }
    std::fs::create_dir_all(&config.html_dir)?;

    let tasks = plan_downloads(read_url_table(input_csv)?, &config.html_dir);
    info!(urls = tasks.len(), "Downloading pages");

    let fetcher = PageFetcher::new().map_err(|e| TransformError::Fetch {
        url: "<client>".to_string(),
        reason: e.to_string(),
    })?;
    let result = run_pool(pool, fetcher, tasks)?;
    if result.failures > 0 {
        warn!(failed = result.failures, "Some pages could not be downloaded");
    }
    Ok(result)
}

#[cfg(not(feature = "download"))]
fn redownload(_pool: &PoolConfig, config: &ScrapeConfig) -> Result<PoolResult<PathBuf>> {
    Err(ConfigError::InvalidInputPath {
        path: config.html_dir.clone(),
        reason: "built without download support".to_string(),
    }
    .into())
}
