//! Configuration types for harvester
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime pool configuration with validation
//! - Per-pipeline job configuration (filter / scrape)

use crate::error::ConfigError;
use clap::{Parser, ValueEnum};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum worker count accepted on the command line
pub const MAX_WORKERS: usize = 63;

/// Default quiet period for idle-timeout collection
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 1000;

/// Parallel JSON filter and HTML regex scraper built on a bounded worker pool
#[derive(Parser, Debug, Clone)]
#[command(
    name = "harvester",
    version,
    about = "Parallel JSON filter and HTML regex scraper built on a bounded worker pool",
    long_about = "Enqueues every input item, spawns a fixed pool of worker threads that drain the queue,\n\
                  and merges the per-worker results into a single JSON or CSV artifact.",
    after_help = "EXAMPLES:\n    \
        harvester -n 4 filter data/json -o q4.json\n    \
        harvester -n 8 scrape --html-dir downloaded_html -o regexes.csv\n    \
        harvester -n 8 --collect idle-timeout --flush per-item scrape -o regexes.csv\n    \
        harvester scrape -i urls.csv --redownload -o regexes.csv"
)]
pub struct CliArgs {
    #[command(flatten)]
    pub pool: PoolArgs,

    /// Pipeline to run
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every pipeline
#[derive(clap::Args, Debug, Clone)]
pub struct PoolArgs {
    /// Number of worker threads
    #[arg(
        short = 'n',
        long,
        global = true,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// How the coordinator decides collection is complete
    #[arg(long, global = true, value_enum, default_value_t = CollectStrategyArg::Counted)]
    pub collect: CollectStrategyArg,

    /// Quiet period that ends idle-timeout collection
    #[arg(long, global = true, default_value_t = DEFAULT_IDLE_TIMEOUT_MS, value_name = "MS")]
    pub idle_timeout_ms: u64,

    /// What a worker does when an item fails to transform
    #[arg(long, global = true, value_enum, default_value_t = FailurePolicy::Skip)]
    pub on_error: FailurePolicy,

    /// When a worker publishes its accumulated records
    #[arg(long, global = true, value_enum, default_value_t = FlushMode::OnExit)]
    pub flush: FlushMode,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output (per-item logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Pipelines
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Filter JSON-lines files, dropping records whose field equals a sentinel
    Filter {
        /// Directory containing *.json input files
        #[arg(value_name = "INPUT_DIR")]
        input_dir: PathBuf,

        /// Output JSON file
        #[arg(short, long, default_value = "filtered.json", value_name = "FILE")]
        output: PathBuf,

        /// Record field compared against the sentinel
        #[arg(long, default_value = "provider")]
        field: String,

        /// Records whose field equals this value are dropped
        #[arg(long, default_value = "GitHub", value_name = "VALUE")]
        exclude_value: String,

        /// Skip input files whose path matches pattern (can be repeated)
        #[arg(long = "skip-path", value_name = "PATTERN", action = clap::ArgAction::Append)]
        skip_patterns: Vec<String>,
    },

    /// Scrape <category, regex> rows from downloaded HTML pages
    Scrape {
        /// Output CSV file
        #[arg(short, long, default_value = "regexes.csv", value_name = "FILE")]
        output: PathBuf,

        /// Directory holding <category>/<NN>.html documents
        #[arg(long, default_value = "downloaded_html", value_name = "DIR")]
        html_dir: PathBuf,

        /// CSV of category,url pairs (used with --redownload)
        #[arg(short = 'i', long, value_name = "FILE")]
        input_csv: Option<PathBuf>,

        /// Delete the HTML directory and fetch every URL from the input CSV again
        #[cfg(feature = "download")]
        #[arg(long, requires = "input_csv")]
        redownload: bool,
    },
}

/// Completion detection for the COLLECT phase (CLI form)
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStrategyArg {
    /// Read exactly one partial result per worker
    Counted,
    /// Stop after a quiet period with no new results
    IdleTimeout,
}

/// Completion detection for the COLLECT phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStrategy {
    /// Block until exactly one partial result per spawned worker has arrived
    Counted,
    /// Block per read for at most the given duration; a timeout ends collection
    IdleTimeout(Duration),
}

impl CollectStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            CollectStrategy::Counted => "counted",
            CollectStrategy::IdleTimeout(_) => "idle-timeout",
        }
    }
}

/// Per-item failure policy
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and continue with the next item
    #[default]
    Skip,
    /// Stop dequeuing, flush what was accumulated, exit
    Abort,
}

/// When a worker publishes to the result queue
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// Once, when the worker's supply is exhausted
    #[default]
    OnExit,
    /// Once per processed item
    PerItem,
}

fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}

/// Validated worker pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads
    pub worker_count: usize,

    /// COLLECT completion strategy
    pub collect: CollectStrategy,

    /// Per-item failure policy
    pub failure_policy: FailurePolicy,

    /// Flush mode
    pub flush_mode: FlushMode,

    /// Show progress indicator
    pub show_progress: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_workers(),
            collect: CollectStrategy::Counted,
            failure_policy: FailurePolicy::Skip,
            flush_mode: FlushMode::OnExit,
            show_progress: false,
        }
    }
}

impl PoolConfig {
    /// Create and validate pool configuration from CLI arguments
    pub fn from_args(args: &PoolArgs) -> Result<Self, ConfigError> {
        let collect = match args.collect {
            CollectStrategyArg::Counted => CollectStrategy::Counted,
            CollectStrategyArg::IdleTimeout => {
                CollectStrategy::IdleTimeout(Duration::from_millis(args.idle_timeout_ms))
            }
        };

        let config = Self {
            worker_count: args.workers,
            collect,
            failure_policy: args.on_error,
            flush_mode: args.flush,
            show_progress: !args.quiet,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the coordinator relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.worker_count,
                max: MAX_WORKERS,
            });
        }

        match self.collect {
            CollectStrategy::IdleTimeout(timeout) if timeout.is_zero() => {
                return Err(ConfigError::InvalidIdleTimeout);
            }
            CollectStrategy::Counted if self.flush_mode == FlushMode::PerItem => {
                return Err(ConfigError::FlushRequiresIdleTimeout);
            }
            _ => {}
        }

        Ok(())
    }

    /// Builder-style helpers, mostly for tests and library callers
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_collect(mut self, collect: CollectStrategy) -> Self {
        self.collect = collect;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_flush_mode(mut self, mode: FlushMode) -> Self {
        self.flush_mode = mode;
        self
    }
}

/// Validated settings for the JSON filter pipeline
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Directory listing the input files
    pub input_dir: PathBuf,

    /// Output JSON path
    pub output_path: PathBuf,

    /// Field compared against the sentinel
    pub field: String,

    /// Sentinel value that excludes a record
    pub exclude_value: String,

    /// Compiled skip patterns for input paths
    pub skip_patterns: Vec<Regex>,
}

impl FilterConfig {
    /// Check if an input path should be skipped
    pub fn is_skipped(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.skip_patterns.iter().any(|re| re.is_match(&path))
    }
}

/// Validated settings for the regex scrape pipeline
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Output CSV path
    pub output_path: PathBuf,

    /// Root of the downloaded HTML tree
    pub html_dir: PathBuf,

    /// Input CSV of category,url pairs
    pub input_csv: Option<PathBuf>,

    /// Re-fetch every URL before scraping
    pub redownload: bool,
}

/// Validated configuration for one pipeline run
#[derive(Debug, Clone)]
pub enum JobConfig {
    Filter(FilterConfig),
    Scrape(ScrapeConfig),
}

impl JobConfig {
    /// Create and validate job configuration from the CLI subcommand
    pub fn from_command(command: Command) -> Result<Self, ConfigError> {
        match command {
            Command::Filter {
                input_dir,
                output,
                field,
                exclude_value,
                skip_patterns,
            } => {
                if !input_dir.is_dir() {
                    return Err(ConfigError::InvalidInputPath {
                        path: input_dir,
                        reason: "Input directory does not exist".to_string(),
                    });
                }
                validate_output(&output)?;

                let skip_patterns = skip_patterns
                    .iter()
                    .map(|p| {
                        Regex::new(p).map_err(|e| ConfigError::InvalidSkipPattern {
                            pattern: p.clone(),
                            reason: e.to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(JobConfig::Filter(FilterConfig {
                    input_dir,
                    output_path: output,
                    field,
                    exclude_value,
                    skip_patterns,
                }))
            }
            Command::Scrape {
                output,
                html_dir,
                input_csv,
                #[cfg(feature = "download")]
                redownload,
            } => {
                #[cfg(not(feature = "download"))]
                let redownload = false;

                validate_output(&output)?;

                if let Some(ref csv) = input_csv {
                    if !csv.is_file() {
                        return Err(ConfigError::InvalidInputPath {
                            path: csv.clone(),
                            reason: "Input CSV does not exist".to_string(),
                        });
                    }
                }
                if !redownload && !html_dir.is_dir() {
                    return Err(ConfigError::InvalidInputPath {
                        path: html_dir,
                        reason: "HTML directory does not exist (use --redownload to fetch it)"
                            .to_string(),
                    });
                }

                Ok(JobConfig::Scrape(ScrapeConfig {
                    output_path: output,
                    html_dir,
                    input_csv,
                    redownload,
                }))
            }
        }
    }

    /// Output artifact path
    pub fn output_path(&self) -> &Path {
        match self {
            JobConfig::Filter(c) => &c.output_path,
            JobConfig::Scrape(c) => &c.output_path,
        }
    }

    /// Short source description for the header
    pub fn source_display(&self) -> String {
        match self {
            JobConfig::Filter(c) => c.input_dir.display().to_string(),
            JobConfig::Scrape(c) => c.html_dir.display().to_string(),
        }
    }
}

fn validate_output(output: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::InvalidOutputPath {
                path: output.to_path_buf(),
                reason: format!("Parent directory '{}' does not exist", parent.display()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_args() -> PoolArgs {
        PoolArgs {
            workers: 4,
            collect: CollectStrategyArg::Counted,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            on_error: FailurePolicy::Skip,
            flush: FlushMode::OnExit,
            quiet: true,
            verbose: false,
        }
    }

    #[test]
    fn test_pool_config_from_args() {
        let config = PoolConfig::from_args(&pool_args()).unwrap();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.collect, CollectStrategy::Counted);
        assert!(!config.show_progress);
    }

    #[test]
    fn test_invalid_worker_count() {
        let mut args = pool_args();
        args.workers = 0;
        assert!(matches!(
            PoolConfig::from_args(&args),
            Err(ConfigError::InvalidWorkerCount { count: 0, .. })
        ));

        args.workers = MAX_WORKERS + 1;
        assert!(PoolConfig::from_args(&args).is_err());
    }

    #[test]
    fn test_idle_timeout_config() {
        let mut args = pool_args();
        args.collect = CollectStrategyArg::IdleTimeout;
        args.idle_timeout_ms = 250;
        let config = PoolConfig::from_args(&args).unwrap();
        assert_eq!(
            config.collect,
            CollectStrategy::IdleTimeout(Duration::from_millis(250))
        );

        args.idle_timeout_ms = 0;
        assert!(matches!(
            PoolConfig::from_args(&args),
            Err(ConfigError::InvalidIdleTimeout)
        ));
    }

    #[test]
    fn test_per_item_flush_requires_idle_timeout() {
        let mut args = pool_args();
        args.flush = FlushMode::PerItem;
        assert!(matches!(
            PoolConfig::from_args(&args),
            Err(ConfigError::FlushRequiresIdleTimeout)
        ));

        args.collect = CollectStrategyArg::IdleTimeout;
        assert!(PoolConfig::from_args(&args).is_ok());
    }

    #[test]
    fn test_skip_pattern() {
        let config = FilterConfig {
            input_dir: PathBuf::from("data"),
            output_path: PathBuf::from("out.json"),
            field: "provider".into(),
            exclude_value: "GitHub".into(),
            skip_patterns: vec![Regex::new(r"\.bak\.json$").unwrap()],
        };

        assert!(config.is_skipped(Path::new("data/mybinder001.bak.json")));
        assert!(!config.is_skipped(Path::new("data/mybinder001.json")));
    }

    #[test]
    fn test_cli_parses_scrape() {
        let args = CliArgs::try_parse_from([
            "harvester",
            "-n",
            "2",
            "--collect",
            "idle-timeout",
            "scrape",
            "--html-dir",
            "pages",
            "-o",
            "out.csv",
        ])
        .unwrap();

        assert_eq!(args.pool.workers, 2);
        assert_eq!(args.pool.collect, CollectStrategyArg::IdleTimeout);
        match args.command {
            Command::Scrape {
                output, html_dir, ..
            } => {
                assert_eq!(output, PathBuf::from("out.csv"));
                assert_eq!(html_dir, PathBuf::from("pages"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
