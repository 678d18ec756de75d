use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::tags::TagSet;

/// Extension of the files we transcode.
pub const SOURCE_EXTENSION: &str = "flac";
/// Extension given to transcoded files.
pub const TARGET_EXTENSION: &str = "mp3";

const DECODE_ARGS: &[&str] = &["--silent", "--stdout", "--decode"];
// simple stereo, VBR quality 2 (~190 kbps)
const ENCODE_ARGS: &[&str] = &["-m", "s", "--vbr-new", "-V2", "--silent"];
const READ_TAGS_ARGS: &[&str] = &["--list", "--block-type=VORBIS_COMMENT"];

/// The external programs a job shells out to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toolchain {
    pub decoder: PathBuf,
    pub encoder: PathBuf,
    pub tag_reader: PathBuf,
    pub tag_writer: PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Toolchain {
            decoder: PathBuf::from("flac"),
            encoder: PathBuf::from("lame"),
            tag_reader: PathBuf::from("metaflac"),
            tag_writer: PathBuf::from("id3v2"),
        }
    }
}

impl Toolchain {
    pub fn programs(&self) -> [&Path; 4] {
        [
            &self.decoder,
            &self.encoder,
            &self.tag_reader,
            &self.tag_writer,
        ]
    }

    /// Programs that cannot be launched at all.
    pub fn missing(&self) -> Vec<PathBuf> {
        self.programs()
            .into_iter()
            .filter(|program| !is_installed(program))
            .map(Path::to_path_buf)
            .collect()
    }

    /// `flac` writing raw audio for `source` to stdout.
    pub fn decode_command(&self, source: &Path) -> Command {
        let mut cmd = Command::new(&self.decoder);
        cmd.args(DECODE_ARGS).arg(source);
        cmd
    }

    /// `lame` reading raw audio from stdin and writing `destination`.
    pub fn encode_command(&self, destination: &Path) -> Command {
        let mut cmd = Command::new(&self.encoder);
        cmd.args(ENCODE_ARGS).arg("-").arg(destination);
        cmd
    }

    pub fn read_tags_command(&self, source: &Path) -> Command {
        let mut cmd = Command::new(&self.tag_reader);
        cmd.args(READ_TAGS_ARGS).arg(source);
        cmd
    }

    pub fn write_tags_command(&self, tags: &TagSet, destination: &Path) -> Command {
        let mut cmd = Command::new(&self.tag_writer);
        cmd.args(tags.id3v2_args()).arg(destination);
        cmd
    }
}

fn is_installed(program: &Path) -> bool {
    let status = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(_) => true,
        // anything but "not found" means the binary exists
        Err(err) => err.kind() != io::ErrorKind::NotFound,
    }
}
