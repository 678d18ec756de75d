mod cli;
mod collect;
mod destination;
mod error;
mod job;
mod logging;
mod pool;
mod report;
mod tags;
mod toolchain;
mod transcode;

use std::fs;
use std::process;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::cli::{Args, Config};
use crate::pool::WorkerPool;
use crate::report::Summary;
use crate::toolchain::{Toolchain, SOURCE_EXTENSION};
use crate::transcode::Transcoder;

const EXIT_FATAL: i32 = 1;
const EXIT_JOBS_FAILED: i32 = 4;

fn main() {
    let config = Config::from(Args::parse());
    let progress = progress_bar(config.quiet);
    if let Err(err) = logging::init(config.quiet, config.log_file.as_deref(), &progress) {
        if !config.quiet {
            eprintln!("Error: {:#}", err);
        }
        process::exit(EXIT_FATAL);
    }

    match run(&config, &progress) {
        Ok(summary) if summary.has_failures() => process::exit(EXIT_JOBS_FAILED),
        Ok(_) => {}
        Err(err) => {
            progress.finish_and_clear();
            error!("{:#}", err);
            process::exit(EXIT_FATAL);
        }
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    pb
}

fn run(config: &Config, progress: &ProgressBar) -> Result<Summary> {
    let toolchain = Toolchain::default();
    let missing = toolchain.missing();
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
        bail!("The following programs are required: {}", names.join(", "));
    }

    if let Some(output_dir) = &config.output_dir {
        fs::create_dir_all(output_dir).with_context(|| {
            format!("couldn't create directory '{}'", output_dir.display())
        })?;
        info!("Output directory: {}", output_dir.display());
    }

    info!("Enumerating files...");
    let collection = collect::collect(&config.inputs, SOURCE_EXTENSION);
    info!(
        "Found {} {} files ({} other files)",
        collection.sources.len(),
        SOURCE_EXTENSION,
        collection.others.len()
    );

    let plan = job::plan(
        &collection,
        config.output_dir.as_deref(),
        config.copy_pattern.as_ref(),
        config.overwrite,
    );
    let mut summary = Summary::new(collection.warnings.len());
    for collision in plan.collisions {
        report::log_result(&collision);
        summary.record(collision);
    }
    let jobs = plan.jobs;

    let pool = WorkerPool::new(config.workers).context("failed to start worker pool")?;
    info!(
        "Beginning transcode of {} files using {} workers...",
        jobs.len(),
        pool.workers()
    );

    let transcoder = Transcoder::new(toolchain);
    let start_time = Instant::now();

    progress.set_length(jobs.len() as u64);
    progress.enable_steady_tick(Duration::from_millis(100));
    pool.run(
        jobs,
        |job| transcoder.process(job),
        |result| {
            report::log_result(&result);
            progress.inc(1);
            progress.set_message(result.short_name());
            summary.record(result);
        },
    );
    progress.finish_and_clear();

    let elapsed = start_time.elapsed();
    info!(
        "Completed in {:.2} seconds: {} succeeded, {} skipped, {} failed",
        elapsed.as_secs_f64(),
        summary.succeeded(),
        summary.skipped,
        summary.failed()
    );
    if !config.quiet {
        print!("\n{}", summary.render(elapsed));
    }
    Ok(summary)
}
