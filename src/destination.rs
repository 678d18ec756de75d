use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::collect::SourceFile;

/// Characters removed from mirrored file and directory names.
const BAD_CHARS: &[char] = &[':'];

/// The directory a source path is made relative to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Anchor {
    /// Write next to the source file.
    Alongside,
    /// Mirror everything relative to one shared ancestor directory.
    Common(PathBuf),
    /// Mirror each file relative to the parent of its own input argument.
    PerRoot,
}

/// Maps source files onto destination paths.
#[derive(Clone, Debug)]
pub struct DestinationMapper {
    output_root: Option<PathBuf>,
    anchor: Anchor,
}

impl DestinationMapper {
    pub fn alongside() -> Self {
        DestinationMapper {
            output_root: None,
            anchor: Anchor::Alongside,
        }
    }

    pub fn mirrored(output_root: impl Into<PathBuf>, ancestor: impl Into<PathBuf>) -> Self {
        DestinationMapper {
            output_root: Some(output_root.into()),
            anchor: Anchor::Common(ancestor.into()),
        }
    }

    pub fn per_root(output_root: impl Into<PathBuf>) -> Self {
        DestinationMapper {
            output_root: Some(output_root.into()),
            anchor: Anchor::PerRoot,
        }
    }

    /// Picks the anchor for a set of files. Without an output root files stay
    /// alongside their sources. When the only directory shared by all files is
    /// the filesystem root, the inputs come from unrelated trees and each one
    /// is mirrored on its own.
    pub fn for_files<'a>(
        output_root: Option<&Path>,
        files: impl IntoIterator<Item = &'a SourceFile>,
    ) -> Self {
        let Some(output_root) = output_root else {
            return DestinationMapper::alongside();
        };
        let parents = files.into_iter().filter_map(|file| file.path.parent());
        match nearest_common_ancestor(parents) {
            Some(ancestor) if has_normal_component(&ancestor) => {
                DestinationMapper::mirrored(output_root, ancestor)
            }
            _ => DestinationMapper::per_root(output_root),
        }
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    /// Destination for `file`. `extension` replaces the source extension;
    /// `None` keeps the file name as is.
    pub fn destination(&self, file: &SourceFile, extension: Option<&str>) -> PathBuf {
        let mapped = match (&self.output_root, &self.anchor) {
            (None, _) | (_, Anchor::Alongside) => file.path.clone(),
            (Some(output_root), Anchor::Common(ancestor)) => {
                output_root.join(relative_to(&file.path, ancestor))
            }
            (Some(output_root), Anchor::PerRoot) => {
                output_root.join(relative_to(&file.path, &file.root))
            }
        };
        match extension {
            Some(extension) => mapped.with_extension(extension),
            None => mapped,
        }
    }
}

/// Deepest directory that contains every path in `dirs`, compared component
/// by component. `None` for an empty input or paths with different prefixes.
pub fn nearest_common_ancestor<'a>(dirs: impl IntoIterator<Item = &'a Path>) -> Option<PathBuf> {
    let mut dirs = dirs.into_iter();
    let mut common: Vec<Component<'a>> = dirs.next()?.components().collect();
    for dir in dirs {
        let shared = common
            .iter()
            .zip(dir.components())
            .take_while(|(a, b)| *a == b)
            .count();
        common.truncate(shared);
        if common.is_empty() {
            return None;
        }
    }
    Some(common.iter().collect())
}

/// Creates the parent directories of `path`.
pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn has_normal_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::Normal(_)))
}

fn relative_to(path: &Path, anchor: &Path) -> PathBuf {
    let relative = match path.strip_prefix(anchor) {
        Ok(relative) => relative,
        Err(_) => path.file_name().map(Path::new).unwrap_or(path),
    };
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => {
                let name: String = name
                    .to_string_lossy()
                    .chars()
                    .filter(|c| !BAD_CHARS.contains(c))
                    .collect();
                (!name.is_empty()).then_some(name)
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn source(path: &str, root: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(path),
            root: PathBuf::from(root),
        }
    }

    #[test]
    fn mirrors_below_common_ancestor() {
        let mapper = DestinationMapper::mirrored("out", "album");
        let file = source("album/disc1/track1.flac", ".");
        assert_eq!(
            mapper.destination(&file, Some("mp3")),
            PathBuf::from("out/disc1/track1.mp3")
        );
    }

    #[test]
    fn mapping_is_idempotent() {
        let mapper = DestinationMapper::mirrored("/out", "/music/album");
        let file = source("/music/album/disc2/07 - Song.flac", "/music");
        let first = mapper.destination(&file, Some("mp3"));
        let second = mapper.destination(&file, Some("mp3"));
        assert_eq!(first, second);
        assert_eq!(first, PathBuf::from("/out/disc2/07 - Song.mp3"));
    }

    #[test]
    fn alongside_changes_only_extension() {
        let mapper = DestinationMapper::alongside();
        let file = source("/music/album/a:b.flac", "/music");
        assert_eq!(
            mapper.destination(&file, Some("mp3")),
            PathBuf::from("/music/album/a:b.mp3")
        );
    }

    #[test]
    fn copies_keep_their_extension() {
        let mapper = DestinationMapper::mirrored("/out", "/music");
        let file = source("/music/album/cover.jpg", "/");
        assert_eq!(
            mapper.destination(&file, None),
            PathBuf::from("/out/album/cover.jpg")
        );
    }

    #[test]
    fn strips_colons_from_mirrored_names() {
        let mapper = DestinationMapper::mirrored("/out", "/music");
        let file = source("/music/Live: 1999/Intro: Part 1.flac", "/");
        assert_eq!(
            mapper.destination(&file, Some("mp3")),
            PathBuf::from("/out/Live 1999/Intro Part 1.mp3")
        );
    }

    #[test]
    fn common_ancestor_is_component_wise() {
        let ancestor = nearest_common_ancestor([
            Path::new("/music/album/disc1"),
            Path::new("/music/album/disc2"),
            Path::new("/music/albums"),
        ]);
        assert_eq!(ancestor, Some(PathBuf::from("/music")));
    }

    #[test]
    fn common_ancestor_of_one_directory_is_itself() {
        let ancestor = nearest_common_ancestor([Path::new("/music/album")]);
        assert_eq!(ancestor, Some(PathBuf::from("/music/album")));
        assert_eq!(nearest_common_ancestor(Vec::<&Path>::new()), None);
    }

    #[test]
    fn shared_ancestor_mirrors_structure() {
        let files = [
            source("/music/album/disc1/01.flac", "/music"),
            source("/music/album/disc2/01.flac", "/music"),
        ];
        let mapper = DestinationMapper::for_files(Some(Path::new("/out")), &files);
        assert_eq!(mapper.anchor(), &Anchor::Common(PathBuf::from("/music/album")));
        assert_eq!(
            mapper.destination(&files[1], Some("mp3")),
            PathBuf::from("/out/disc2/01.mp3")
        );
    }

    #[test]
    fn unrelated_trees_fall_back_to_per_root() {
        let files = [
            source("/srv/a/albumA/01.flac", "/srv/a"),
            source("/home/b/albumB/cd1/01.flac", "/home/b"),
        ];
        let mapper = DestinationMapper::for_files(Some(Path::new("/out")), &files);
        assert_eq!(mapper.anchor(), &Anchor::PerRoot);
        assert_eq!(
            mapper.destination(&files[0], Some("mp3")),
            PathBuf::from("/out/albumA/01.mp3")
        );
        assert_eq!(
            mapper.destination(&files[1], Some("mp3")),
            PathBuf::from("/out/albumB/cd1/01.mp3")
        );
    }

    #[test]
    fn no_output_root_means_alongside() {
        let files = [source("/music/a.flac", "/")];
        let mapper = DestinationMapper::for_files(None, &files);
        assert_eq!(mapper.anchor(), &Anchor::Alongside);
    }

    #[test]
    fn ensure_parent_creates_missing_directories() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a/b/c/track.mp3");
        ensure_parent(&target).unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
        ensure_parent(&target).unwrap();
        ensure_parent(Path::new("track.mp3")).unwrap();
    }
}
