//! Vorbis comments read with `metaflac` and their ID3v2 equivalents.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::TagReadError;
use crate::toolchain::Toolchain;

/// Vorbis comment names with a dedicated ID3v2 text frame.
const FRAMES: &[(&str, &str)] = &[
    ("TITLE", "TIT2"),
    ("ARTIST", "TPE1"),
    ("ALBUM", "TALB"),
    ("ALBUMARTIST", "TPE2"),
    ("COMPOSER", "TCOM"),
    ("DATE", "TYER"),
    ("GENRE", "TCON"),
    ("COMMENT", "COMM"),
];

const COMMENT_LANGUAGE: &str = "eng";

/// Tag name to value. Names are stored upper-cased.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        TagSet::default()
    }

    /// Sets `name` (case-insensitive), replacing any earlier value.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.trim().to_uppercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_uppercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Parses the output of `metaflac --list --block-type=VORBIS_COMMENT`.
    ///
    /// Only lines like `    comment[0]: TITLE=Misery` contribute. When a
    /// name repeats, the last value wins.
    pub fn parse_metaflac_listing(text: &str) -> Self {
        let mut tags = TagSet::new();
        for caps in comment_pattern().captures_iter(text) {
            tags.insert(&caps[1], caps[2].trim_end_matches('\r'));
        }
        tags
    }

    /// Command-line arguments for `id3v2` that write this tag set.
    ///
    /// Track and disc numbers are merged with their totals (`3/12`), names
    /// without a dedicated frame become `TXXX` user text frames. `id3v2`
    /// reads `COMM` as `description:text:language`, so the comment gets an
    /// empty description and an explicit language around it.
    pub fn id3v2_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let mut push = |frame: &str, value: String| {
            args.push(format!("--{frame}"));
            args.push(value);
        };

        for (name, frame) in FRAMES {
            if let Some(value) = self.get(name) {
                let value = match *frame {
                    "COMM" => format!(":{value}:{COMMENT_LANGUAGE}"),
                    _ => value.to_string(),
                };
                push(frame, value);
            }
        }
        if let Some(number) = numbered(self.get("TRACKNUMBER"), self.get("TRACKTOTAL")) {
            push("TRCK", number);
        }
        if let Some(number) = numbered(self.get("DISCNUMBER"), self.get("DISCTOTAL")) {
            push("TPOS", number);
        }

        for (name, value) in self.iter() {
            if is_mapped(name, self) {
                continue;
            }
            push("TXXX", format!("{name}:{value}"));
        }
        args
    }
}

impl FromIterator<(String, String)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut tags = TagSet::new();
        for (name, value) in iter {
            tags.insert(&name, value);
        }
        tags
    }
}

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\s*comment\[\d+\]:\s+([^=\n]+)=([^\n]+)$")
            .unwrap_or_else(|err| panic!("invalid comment pattern: {err}"))
    })
}

fn numbered(number: Option<&str>, total: Option<&str>) -> Option<String> {
    let number = number?;
    match total {
        Some(total) if !number.contains('/') => Some(format!("{number}/{total}")),
        _ => Some(number.to_string()),
    }
}

fn is_mapped(name: &str, tags: &TagSet) -> bool {
    if FRAMES.iter().any(|(known, _)| *known == name) {
        return true;
    }
    match name {
        "TRACKNUMBER" | "DISCNUMBER" => true,
        // totals only fold into the number frame when a number exists
        "TRACKTOTAL" => tags.get("TRACKNUMBER").is_some(),
        "DISCTOTAL" => tags.get("DISCNUMBER").is_some(),
        _ => false,
    }
}

/// Runs the tag reader against `source`.
pub fn try_read_tags(toolchain: &Toolchain, source: &Path) -> Result<TagSet, TagReadError> {
    let output = toolchain
        .read_tags_command(source)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| TagReadError::Spawn {
            program: toolchain.tag_reader.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(TagReadError::Exit {
            program: toolchain.tag_reader.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(TagSet::parse_metaflac_listing(&String::from_utf8_lossy(
        &output.stdout,
    )))
}

/// Like [`try_read_tags`] but never fails: problems are logged and an
/// empty tag set is returned.
pub fn read_tags(toolchain: &Toolchain, source: &Path) -> TagSet {
    match try_read_tags(toolchain, source) {
        Ok(tags) => {
            debug!("Read {} tags from '{}'", tags.len(), source.display());
            tags
        }
        Err(err) => {
            warn!("Could not read tags from '{}': {}", source.display(), err);
            TagSet::new()
        }
    }
}
