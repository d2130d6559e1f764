//! Progress reporting for pool runs
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::pool::PoolProgress;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays run status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &PoolProgress) {
        self.bar.set_message(format_progress(progress));
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_progress(progress: &PoolProgress) -> String {
    format!(
        "Items: {}/{} | Records: {} | Failed: {} | Rate: {:.0}/s | Queue: {} | Results: {}/{}",
        format_number(progress.items_processed),
        format_number(progress.total_items as u64),
        format_number(progress.records),
        format_number(progress.failures),
        progress.items_per_second(),
        progress.queue_size,
        progress.partials,
        progress.total_workers,
    )
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Final numbers shown after a run
#[derive(Debug, Clone)]
pub struct RunSummary<'a> {
    pub items: u64,
    pub records: usize,
    pub failures: u64,
    pub lost_workers: usize,
    pub duration: Duration,
    pub output_path: &'a str,
    pub output_size: Option<u64>,
}

/// Print a summary of the run
pub fn print_summary(summary: &RunSummary<'_>) {
    let duration_secs = summary.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        summary.items as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Run Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Items:").bold(), format_number(summary.items));
    println!(
        "  {} {}",
        style("Records:").bold(),
        format_number(summary.records as u64)
    );
    println!(
        "  {} {:.1} ms ({:.0} items/sec)",
        style("Elapsed:").bold(),
        summary.duration.as_secs_f64() * 1000.0,
        rate
    );
    if summary.failures > 0 {
        println!(
            "  {} {}",
            style("Failed items:").yellow().bold(),
            format_number(summary.failures)
        );
    }
    if summary.lost_workers > 0 {
        println!(
            "  {} {} worker(s) did not deliver results",
            style("Lost:").red().bold(),
            summary.lost_workers
        );
    }
    if let Some(size) = summary.output_size {
        println!(
            "  {} {} ({})",
            style("Output:").bold(),
            summary.output_path,
            format_size(size, BINARY)
        );
    } else {
        println!("  {} {}", style("Output:").bold(), summary.output_path);
    }
    println!();
}

/// Print a header at the start of the run
pub fn print_header(pipeline: &str, source: &str, workers: usize, output: &str) {
    println!();
    println!(
        "{} {}",
        style("harvester").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Pipeline:").bold(), pipeline);
    println!("  {} {}", style("Source:").bold(), source);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_progress() {
        let progress = PoolProgress {
            items_processed: 1500,
            total_items: 2000,
            records: 42,
            failures: 1,
            partials: 2,
            queue_size: 500,
            total_workers: 4,
            elapsed: Duration::from_secs(1),
        };

        let msg = format_progress(&progress);
        assert!(msg.contains("Items: 1,500/2,000"));
        assert!(msg.contains("Results: 2/4"));
    }
}
