use std::fmt::Write as _;
use std::time::Duration;

use tracing::{error, info};

use crate::job::{Outcome, WorkResult};

/// Logs one finished job.
pub fn log_result(result: &WorkResult) {
    let name = result.short_name();
    let secs = result.elapsed.as_secs_f64();
    match &result.outcome {
        Outcome::Transcoded => info!("Transcoded '{}' in {:.2} seconds", name, secs),
        Outcome::Copied => info!("Copied '{}' to '{}'", name, result.destination.display()),
        Outcome::Skipped => info!(
            "Did not transcode '{}': '{}' already exists",
            name,
            result.destination.display()
        ),
        Outcome::Failed(err) => match err.stderr() {
            Some(stderr) => error!(
                "Failed to transcode '{}' after {:.2} seconds: {}\n{}",
                name, secs, err, stderr
            ),
            None => error!(
                "Failed to transcode '{}' after {:.2} seconds: {}",
                name, secs, err
            ),
        },
    }
}

/// Tally of finished jobs, built by the single thread receiving results.
#[derive(Debug, Default)]
pub struct Summary {
    pub transcoded: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failures: Vec<WorkResult>,
    pub collection_warnings: usize,
}

impl Summary {
    pub fn new(collection_warnings: usize) -> Self {
        Summary {
            collection_warnings,
            ..Summary::default()
        }
    }

    pub fn record(&mut self, result: WorkResult) {
        match result.outcome {
            Outcome::Transcoded => self.transcoded += 1,
            Outcome::Copied => self.copied += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed(_) => self.failures.push(result),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.transcoded + self.copied
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded() + self.skipped + self.failed()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Human-readable report, failures itemized with captured stderr.
    pub fn render(&self, elapsed: Duration) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Transcode Summary:");
        let _ = writeln!(out, "Total files processed: {}", self.total());
        let _ = writeln!(out, "Succeeded: {}", self.succeeded());
        if self.copied > 0 {
            let _ = writeln!(out, "  (of which copied: {})", self.copied);
        }
        let _ = writeln!(out, "Skipped: {}", self.skipped);
        let _ = writeln!(out, "Failed: {}", self.failed());
        if self.collection_warnings > 0 {
            let _ = writeln!(out, "Unreadable inputs: {}", self.collection_warnings);
        }
        let _ = writeln!(out, "Time taken: {:.2} seconds", elapsed.as_secs_f64());

        if self.has_failures() {
            let _ = writeln!(out, "\nFailures:");
            for failure in &self.failures {
                let Outcome::Failed(err) = &failure.outcome else {
                    continue;
                };
                let _ = writeln!(out, "  {}: {}", failure.source.display(), err);
                if let Some(stderr) = err.stderr() {
                    for line in stderr.lines() {
                        let _ = writeln!(out, "      {line}");
                    }
                }
            }
        }
        out
    }
}
