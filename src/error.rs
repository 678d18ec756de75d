//! Error types for collection, tag reading and per-file jobs.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;

/// One stage of a job, used to tell the operator which program failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Decode,
    Encode,
    Tag,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Decode => "decode",
            Step::Encode => "encode",
            Step::Tag => "tag",
        };
        f.write_str(name)
    }
}

/// Problems met while enumerating input paths. Never fatal: the offending
/// path is reported and skipped.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("input path does not exist: {}", path.display())]
    Missing { path: PathBuf },

    #[error("symlink loop at {} (points back to {})", path.display(), ancestor.display())]
    Loop { path: PathBuf, ancestor: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CollectError {
    pub(crate) fn from_walk(root: &Path, err: walkdir::Error) -> Self {
        let path = err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        if let Some(ancestor) = err.loop_ancestor() {
            return CollectError::Loop {
                ancestor: ancestor.to_path_buf(),
                path,
            };
        }
        let source = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory walk failed"));
        CollectError::Unreadable { path, source }
    }
}

/// Reading tags failed. Callers treat this as "no tags".
#[derive(Debug, Error)]
pub enum TagReadError {
    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} exited with {status}: {stderr}", program.display())]
    Exit {
        program: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
}

/// Why a single job failed.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to start {step} program {}: {source}", program.display())]
    Spawn {
        step: Step,
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{step} step exited with {status}")]
    Process {
        step: Step,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is already the destination of {}", destination.display(), claimed_by.display())]
    Collision {
        destination: PathBuf,
        claimed_by: PathBuf,
    },
}

impl JobError {
    pub fn spawn(step: Step, program: &Path, source: io::Error) -> Self {
        JobError::Spawn {
            step,
            program: program.to_path_buf(),
            source,
        }
    }

    pub fn process(step: Step, status: ExitStatus, stderr: &[u8]) -> Self {
        JobError::Process {
            step,
            status,
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        JobError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Captured standard error of the failing program, if any was produced.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            JobError::Process { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}
