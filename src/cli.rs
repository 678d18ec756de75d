use std::path::PathBuf;

use clap::Parser;
use regex::Regex;

#[derive(Parser, Debug)]
#[command(name = "flac2mp3", version)]
#[command(about = "Transcodes FLAC files to MP3 using flac, lame, metaflac and id3v2")]
pub struct Args {
    /// Files and/or directories to transcode
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    /// Directory to write transcoded files to (will be created if it doesn't
    /// exist). Without it, MP3s are written next to their FLACs
    #[arg(short = 'o', long, value_name = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of files to transcode in parallel (default: number of CPU cores)
    #[arg(short = 'j', long = "jobs", value_name = "WORKERS",
          default_value_t = num_cpus::get(), value_parser = parse_workers)]
    pub workers: usize,

    /// Append log output to this file as well as the console
    #[arg(short = 'l', long, value_name = "LOGFILE")]
    pub logfile: Option<PathBuf>,

    /// Transcode even if the output file already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Disable console output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Copy non-FLAC files whose path matches this pattern into the output
    /// directory. Only used together with --output-dir
    #[arg(short = 'c', long, value_name = "PATTERN", value_parser = parse_pattern)]
    pub copy_pattern: Option<Regex>,
}

fn parse_workers(value: &str) -> Result<usize, String> {
    let workers: usize = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if workers < 1 {
        return Err("worker count must be at least 1".into());
    }
    Ok(workers)
}

fn parse_pattern(value: &str) -> Result<Regex, regex::Error> {
    Regex::new(value)
}

/// Everything a run needs, resolved from the command line.
#[derive(Clone, Debug)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub workers: usize,
    pub log_file: Option<PathBuf>,
    pub overwrite: bool,
    pub quiet: bool,
    pub copy_pattern: Option<Regex>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            inputs: args.files,
            output_dir: args.output_dir,
            workers: args.workers,
            log_file: args.logfile,
            overwrite: args.overwrite,
            quiet: args.quiet,
            copy_pattern: args.copy_pattern,
        }
    }
}
