use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::thread;
use std::time::Instant;

use tracing::{debug, info};

use crate::destination::ensure_parent;
use crate::error::{JobError, Step};
use crate::job::{short_name, JobKind, JobSpec, Outcome, WorkResult};
use crate::tags::{self, TagSet};
use crate::toolchain::Toolchain;

/// Runs jobs to completion against a fixed set of external programs.
#[derive(Clone, Debug)]
pub struct Transcoder {
    toolchain: Toolchain,
}

impl Transcoder {
    pub fn new(toolchain: Toolchain) -> Self {
        Transcoder { toolchain }
    }

    /// Runs `job` and reports how it went. Never panics on job failure: every
    /// error ends up in the returned [`WorkResult`].
    pub fn process(&self, job: JobSpec) -> WorkResult {
        let start_time = Instant::now();
        let outcome = match job.kind {
            JobKind::Transcode => self.transcode(&job),
            JobKind::Copy => self.copy(&job),
        };
        let outcome = outcome.unwrap_or_else(Outcome::Failed);
        WorkResult::new(job, outcome, start_time.elapsed())
    }

    fn transcode(&self, job: &JobSpec) -> Result<Outcome, JobError> {
        if job.destination.exists() && !job.overwrite {
            return Ok(Outcome::Skipped);
        }
        info!("Transcoding '{}'...", short_name(&job.source));

        ensure_parent(&job.destination).map_err(|e| JobError::io(&job.destination, e))?;
        let tags = tags::read_tags(&self.toolchain, &job.source);
        self.pipe(&job.source, &job.destination)?;
        self.apply_tags(&tags, &job.destination)?;
        Ok(Outcome::Transcoded)
    }

    fn copy(&self, job: &JobSpec) -> Result<Outcome, JobError> {
        let onto_itself = same_file(&job.source, &job.destination);
        if job.destination.exists() && (!job.overwrite || onto_itself) {
            return Ok(Outcome::Skipped);
        }
        ensure_parent(&job.destination).map_err(|e| JobError::io(&job.destination, e))?;
        fs::copy(&job.source, &job.destination).map_err(|e| JobError::io(&job.source, e))?;
        Ok(Outcome::Copied)
    }

    /// Decoder stdout feeds encoder stdin; both stderr streams are captured.
    fn pipe(&self, source: &Path, destination: &Path) -> Result<(), JobError> {
        let mut decoder = self
            .toolchain
            .decode_command(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| JobError::spawn(Step::Decode, &self.toolchain.decoder, e))?;

        let Some(decoded) = decoder.stdout.take() else {
            let _ = decoder.kill();
            let _ = decoder.wait();
            return Err(JobError::io(
                source,
                std::io::Error::new(std::io::ErrorKind::Other, "decoder stdout not captured"),
            ));
        };

        // the encoder owns the only read end, so the decoder sees a broken
        // pipe if the encoder dies early
        let encoder = self
            .toolchain
            .encode_command(destination)
            .stdin(Stdio::from(decoded))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();
        let encoder = match encoder {
            Ok(child) => child,
            Err(e) => {
                let _ = decoder.kill();
                let _ = decoder.wait();
                return Err(JobError::spawn(Step::Encode, &self.toolchain.encoder, e));
            }
        };

        let decoder_stderr = decoder.stderr.take();
        let drain = thread::spawn(move || {
            let mut captured = Vec::new();
            if let Some(mut stderr) = decoder_stderr {
                let _ = stderr.read_to_end(&mut captured);
            }
            captured
        });

        let encoded = encoder
            .wait_with_output()
            .map_err(|e| JobError::io(destination, e))?;
        let decode_status = decoder.wait().map_err(|e| JobError::io(source, e))?;
        let decode_stderr = drain.join().unwrap_or_default();

        // a decoder killed by the broken pipe is a symptom of the encoder
        // failing, any other decoder failure is the cause
        let decode_failed = !decode_status.success();
        if decode_failed && !killed_by_broken_pipe(decode_status) {
            return Err(JobError::process(Step::Decode, decode_status, &decode_stderr));
        }
        if !encoded.status.success() {
            return Err(JobError::process(Step::Encode, encoded.status, &encoded.stderr));
        }
        if decode_failed {
            return Err(JobError::process(Step::Decode, decode_status, &decode_stderr));
        }
        Ok(())
    }

    fn apply_tags(&self, tags: &TagSet, destination: &Path) -> Result<(), JobError> {
        if tags.is_empty() {
            debug!("No tags to write to '{}'", destination.display());
            return Ok(());
        }
        let output = self
            .toolchain
            .write_tags_command(tags, destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| JobError::spawn(Step::Tag, &self.toolchain.tag_writer, e))?;
        if !output.status.success() {
            return Err(JobError::process(Step::Tag, output.status, &output.stderr));
        }
        Ok(())
    }
}

/// True when both paths name the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(unix)]
fn killed_by_broken_pipe(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    const SIGPIPE: i32 = 13;
    status.signal() == Some(SIGPIPE)
}

#[cfg(not(unix))]
fn killed_by_broken_pipe(_status: ExitStatus) -> bool {
    false
}
