//! Path existence queries and lexical path normalization.

use std::path::{Component, Path, PathBuf};

/// What currently exists at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Missing,
    File,
    Directory,
}

/// Answers "does this path exist, and is it a directory".
pub trait PathProbe: Send {
    fn probe(&self, path: &Path) -> PathKind;
}

/// Probe backed by the real filesystem. Symlinks are followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn probe(&self, path: &Path) -> PathKind {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => PathKind::Directory,
            Ok(_) => PathKind::File,
            Err(_) => PathKind::Missing,
        }
    }
}

/// Normalize a path into a registry key.
///
/// Relative paths are joined onto the current directory, `.` is dropped
/// and `..` pops a component. Symlinks and case are left alone.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fs_probe_kinds() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f.txt");
        fs::write(&file, "x").unwrap();

        assert_eq!(FsProbe.probe(temp.path()), PathKind::Directory);
        assert_eq!(FsProbe.probe(&file), PathKind::File);
        assert_eq!(FsProbe.probe(&temp.path().join("nope")), PathKind::Missing);
    }

    #[test]
    fn test_normalize_lexical() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/a/b/")), PathBuf::from("/a/b"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
    }

    #[test]
    fn test_normalize_relative_is_absolute() {
        let normalized = normalize(Path::new("some/file.txt"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("some/file.txt"));
    }
}
