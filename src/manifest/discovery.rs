//! Filesystem discovery of manifests and cache directories.
//!
//! The walk is depth-first, follows symlinks and threads an explicit set of
//! visited canonical paths so link cycles are entered only once. Unreadable
//! entries are skipped.

use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use crate::manifest::loader::MANIFEST_EXTENSION;

/// What the walker should do after visiting an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Keep going (descend if the entry is a directory).
    Descend,
    /// Do not descend into this directory.
    Skip,
}

/// Visit `path` and everything below it.
pub fn walk(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    visit: &mut dyn FnMut(&Path, &Metadata) -> Visit,
) {
    let Ok(real) = fs::canonicalize(path) else {
        tracing::debug!(path = %path.display(), "Skipping unresolvable path");
        return;
    };
    if !visited.insert(real) {
        return;
    }
    let Ok(metadata) = fs::metadata(path) else {
        return;
    };
    if visit(path, &metadata) == Visit::Skip || !metadata.is_dir() {
        return;
    }

    let Ok(entries) = fs::read_dir(path) else {
        tracing::debug!(path = %path.display(), "Skipping unreadable directory");
        return;
    };
    let mut children: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    children.sort();
    for child in children {
        walk(&child, visited, visit);
    }
}

/// All manifest files under `root`, skipping build cache directories.
pub fn find_manifests(root: &Path, cache_dir: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    walk(root, &mut visited, &mut |path, metadata| {
        if metadata.is_dir() {
            return if is_named(path, cache_dir) {
                Visit::Skip
            } else {
                Visit::Descend
            };
        }
        if path.extension().is_some_and(|ext| ext == MANIFEST_EXTENSION) {
            found.push(path.to_path_buf());
        }
        Visit::Descend
    });
    found
}

/// All build cache directories under `root`.
///
/// Directories reached through symlinks that resolve outside `root` are
/// neither entered nor reported.
pub fn find_cache_dirs(root: &Path, cache_dir: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(real_root) = fs::canonicalize(root) else {
        return found;
    };
    let mut visited = HashSet::new();
    walk(root, &mut visited, &mut |path, metadata| {
        if metadata.is_dir() && !is_inside(path, &real_root) {
            tracing::debug!(path = %path.display(), "Skipping directory outside the content root");
            return Visit::Skip;
        }
        if metadata.is_dir() && is_named(path, cache_dir) {
            found.push(path.to_path_buf());
            return Visit::Skip;
        }
        Visit::Descend
    });
    found
}

fn is_inside(path: &Path, real_root: &Path) -> bool {
    fs::canonicalize(path).is_ok_and(|real| real.starts_with(real_root))
}

fn is_named(path: &Path, name: &str) -> bool {
    path.file_name().is_some_and(|file_name| file_name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_find_manifests_skips_cache() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("app.manifest"));
        touch(&root.join("nested/deep/widget.manifest"));
        touch(&root.join("nested/deep/widget.js"));
        touch(&root.join(".lib/stale.manifest"));

        let found = find_manifests(root, ".lib");
        assert_eq!(
            found,
            vec![root.join("app.manifest"), root.join("nested/deep/widget.manifest")]
        );
    }

    #[test]
    fn test_find_cache_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join(".lib/app.js"));
        touch(&root.join("src/.lib/main.js"));
        touch(&root.join("src/main.js"));

        let found = find_cache_dirs(root, ".lib");
        assert_eq!(found, vec![root.join(".lib"), root.join("src/.lib")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_visited_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a/app.manifest"));
        std::os::unix::fs::symlink(root.join("a"), root.join("a/loop")).unwrap();

        let found = find_manifests(root, ".lib");
        assert_eq!(found, vec![root.join("a/app.manifest")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_dirs_behind_outside_symlinks_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("src/.lib/main.js"));
        touch(&outside.path().join("shared/.lib/keep.js"));
        touch(&outside.path().join(".lib/keep.js"));
        fs::create_dir_all(root.join("web")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("shared"), root.join("vendor")).unwrap();
        std::os::unix::fs::symlink(outside.path().join(".lib"), root.join("web/.lib")).unwrap();

        let found = find_cache_dirs(root, ".lib");
        assert_eq!(found, vec![root.join("src/.lib")]);
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_manifests(&dir.path().join("missing"), ".lib").is_empty());
    }
}
