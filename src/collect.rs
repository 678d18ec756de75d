use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::CollectError;

/// A discovered file and the directory its input argument lives in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Parent of the input argument the file was found under. Used to mirror
    /// inputs that share no common ancestor.
    pub root: PathBuf,
}

#[derive(Debug, Default)]
pub struct Collection {
    /// Files carrying the source extension, in discovery order.
    pub sources: Vec<SourceFile>,
    /// Every other regular file found.
    pub others: Vec<SourceFile>,
    pub warnings: Vec<CollectError>,
}

impl Collection {
    fn warn(&mut self, err: CollectError) {
        warn!("Skipping {}", err);
        self.warnings.push(err);
    }
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map_or(false, |ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}

/// Walks `inputs` and splits the regular files found into sources (those
/// with `extension`) and everything else.
///
/// Directories are walked recursively, following symlinks, in file name
/// order. A file reachable through several inputs (or links) is reported once,
/// at its first occurrence.
pub fn collect(inputs: &[PathBuf], extension: &str) -> Collection {
    let mut collection = Collection::default();
    let mut seen = HashSet::new();

    for input in inputs {
        let input = match fs::canonicalize(input) {
            Ok(path) => path,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                collection.warn(CollectError::Missing {
                    path: input.clone(),
                });
                continue;
            }
            Err(source) => {
                collection.warn(CollectError::Unreadable {
                    path: input.clone(),
                    source,
                });
                continue;
            }
        };
        let root = input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| input.clone());

        for entry in WalkDir::new(&input).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    collection.warn(CollectError::from_walk(&input, err));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            let identity = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if !seen.insert(identity) {
                debug!("Already collected '{}'", path.display());
                continue;
            }

            let file = SourceFile {
                path,
                root: root.clone(),
            };
            if has_extension(&file.path, extension) {
                collection.sources.push(file);
            } else {
                collection.others.push(file);
            }
        }
    }

    collection
}
