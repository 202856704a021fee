//! Manifest loading from disk.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::manifest::schema::Manifest;

/// Extension of manifest files.
pub const MANIFEST_EXTENSION: &str = "manifest";

/// Errors that can occur while reading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest disappeared between routing and reading.
    #[error("manifest not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read manifest {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid manifest {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Path of the manifest controlling `script`: `dir/app.js` → `dir/app.manifest`.
///
/// Returns `None` for paths that are not scripts.
pub fn manifest_path_for(script: &Path) -> Option<PathBuf> {
    match script.extension() {
        Some(ext) if ext == "js" => Some(script.with_extension(MANIFEST_EXTENSION)),
        _ => None,
    }
}

/// Read and parse a manifest document.
pub async fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let content = tokio::fs::read(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ManifestError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ManifestError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_json::from_slice(&content).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
