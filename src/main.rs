//! harvester - parallel JSON filter and HTML regex scraper
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use harvester::config::{CliArgs, JobConfig, PoolConfig};
use harvester::jobs::{run_filter, run_scrape, JobReport};
use harvester::progress::{print_header, print_summary, RunSummary};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.pool.verbose)?;

    // Validate and create config
    let pool = PoolConfig::from_args(&args.pool).context("Invalid configuration")?;
    let job = JobConfig::from_command(args.command).context("Invalid configuration")?;

    let pipeline = match job {
        JobConfig::Filter(_) => "filter",
        JobConfig::Scrape(_) => "scrape",
    };

    // Print header
    if pool.show_progress {
        print_header(
            pipeline,
            &job.source_display(),
            pool.worker_count,
            &job.output_path().display().to_string(),
        );
    }

    info!(
        pipeline = pipeline,
        workers = pool.worker_count,
        strategy = pool.collect.name(),
        "Starting harvest"
    );

    let report = match job {
        JobConfig::Filter(ref config) => run_filter(&pool, config).context("Filter failed")?,
        JobConfig::Scrape(ref config) => run_scrape(&pool, config).context("Scrape failed")?,
    };

    if pool.show_progress {
        print_report(&report);
    }

    // Report success/failure
    if !report.completed {
        info!(
            lost_workers = report.lost_workers,
            "Run finished before every worker delivered its results"
        );
    }

    if report.failures > 0 {
        info!(failures = report.failures, "Run completed with failed items");
    }

    Ok(())
}

fn print_report(report: &JobReport) {
    print_summary(&RunSummary {
        items: report.items,
        records: report.records,
        failures: report.failures,
        lost_workers: report.lost_workers,
        duration: report.duration,
        output_path: &report.output_path.display().to_string(),
        output_size: Some(report.output_size),
    });
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("harvester=debug,warn")
    } else {
        EnvFilter::new("harvester=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(verbose)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
