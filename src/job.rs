use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::collect::{Collection, SourceFile};
use crate::destination::DestinationMapper;
use crate::error::JobError;
use crate::toolchain::TARGET_EXTENSION;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// Decode, encode and tag.
    Transcode,
    /// Copy the file unchanged.
    Copy,
}

/// One source-to-destination conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSpec {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub overwrite: bool,
    pub kind: JobKind,
}

#[derive(Debug)]
pub enum Outcome {
    Transcoded,
    Copied,
    /// The destination already existed and overwriting was not requested.
    Skipped,
    Failed(JobError),
}

/// What happened to one job.
#[derive(Debug)]
pub struct WorkResult {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

impl WorkResult {
    pub fn new(job: JobSpec, outcome: Outcome, elapsed: Duration) -> Self {
        WorkResult {
            source: job.source,
            destination: job.destination,
            outcome,
            elapsed,
        }
    }

    /// File name of the source, for compact log lines.
    pub fn short_name(&self) -> String {
        short_name(&self.source)
    }
}

pub fn short_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Jobs ready to run, and the ones refused because another job already
/// writes their destination.
#[derive(Debug, Default)]
pub struct Plan {
    pub jobs: Vec<JobSpec>,
    pub collisions: Vec<WorkResult>,
}

/// Turns a collection into jobs.
///
/// Every source becomes a transcode job. Other files become copy jobs only
/// when there is an output directory and their path matches `copy_pattern`.
/// Each destination belongs to the first job that maps onto it; later jobs
/// with the same destination end up in [`Plan::collisions`] as failures.
pub fn plan(
    collection: &Collection,
    output_dir: Option<&Path>,
    copy_pattern: Option<&Regex>,
    overwrite: bool,
) -> Plan {
    let copies: Vec<&SourceFile> = match (output_dir, copy_pattern) {
        (Some(_), Some(pattern)) => collection
            .others
            .iter()
            .filter(|file| {
                let matched = pattern.is_match(&file.path.to_string_lossy());
                if !matched {
                    debug!("Skipped '{}'", file.path.display());
                }
                matched
            })
            .collect(),
        _ => {
            for file in &collection.others {
                debug!("Skipped '{}'", file.path.display());
            }
            Vec::new()
        }
    };

    let mapper = DestinationMapper::for_files(
        output_dir,
        collection.sources.iter().chain(copies.iter().copied()),
    );
    debug!("Mirroring relative to {:?}", mapper.anchor());

    let transcodes = collection.sources.iter().map(|file| JobSpec {
        source: file.path.clone(),
        destination: mapper.destination(file, Some(TARGET_EXTENSION)),
        overwrite,
        kind: JobKind::Transcode,
    });
    let copies = copies.into_iter().map(|file| JobSpec {
        source: file.path.clone(),
        destination: mapper.destination(file, None),
        overwrite,
        kind: JobKind::Copy,
    });

    let mut plan = Plan::default();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    for job in transcodes.chain(copies) {
        match claimed.entry(job.destination.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(job.source.clone());
                plan.jobs.push(job);
            }
            Entry::Occupied(slot) => {
                let err = JobError::Collision {
                    destination: job.destination.clone(),
                    claimed_by: slot.get().clone(),
                };
                plan.collisions
                    .push(WorkResult::new(job, Outcome::Failed(err), Duration::ZERO));
            }
        }
    }
    plan
}
