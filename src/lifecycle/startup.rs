//! Startup orchestration.
//!
//! # Responsibilities
//! - Report which resources are manifest-controlled
//! - Optionally purge build caches before serving
//!
//! # Design Decisions
//! - Runs before the listener accepts traffic
//! - Inventory problems are logged, never fatal

use std::path::{Path, PathBuf};

use crate::manifest::discovery::{find_cache_dirs, find_manifests};

/// Log every manifest found under `root`, returning them.
pub fn log_inventory(root: &Path, cache_dir: &str) -> Vec<PathBuf> {
    let manifests = find_manifests(root, cache_dir);
    if manifests.is_empty() {
        tracing::warn!(root = %root.display(), "No manifests found; every path is served as a static file");
    }
    for manifest in &manifests {
        let shown = manifest.strip_prefix(root).unwrap_or(manifest);
        tracing::info!(manifest = %shown.display(), "Serving manifest");
    }
    manifests
}

/// Remove every build cache directory under `root`.
///
/// Returns how many directories were removed.
pub fn reset_caches(root: &Path, cache_dir: &str) -> std::io::Result<usize> {
    let dirs = find_cache_dirs(root, cache_dir);
    for dir in &dirs {
        tracing::info!(dir = %dir.display(), "Removing build cache");
        std::fs::remove_dir_all(dir)?;
    }
    Ok(dirs.len())
}
