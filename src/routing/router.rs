//! Path resolution and dispatch.
//!
//! # Responsibilities
//! - Map URL paths onto the content root without escaping it
//! - Decide whether a path is manifest-controlled or a plain static file
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - `..` is clamped at the root instead of rejected
//! - The decision is made per request from the filesystem; nothing is indexed

use std::path::{Path, PathBuf};

use crate::manifest::manifest_path_for;

/// How a request path is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// A script with a sibling manifest: build per client capabilities.
    Manifest { script: PathBuf, manifest: PathBuf },
    /// Anything else: serve the file as is (404 if absent).
    Static(PathBuf),
}

impl Route {
    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Route::Manifest { .. } => "manifest",
            Route::Static(_) => "static",
        }
    }
}

/// Resolves request paths below a content root.
#[derive(Debug, Clone)]
pub struct ContentRouter {
    root: PathBuf,
}

impl ContentRouter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location for a URL path.
    pub fn locate(&self, url_path: &str) -> PathBuf {
        self.root.join(normalize(url_path))
    }

    /// Route for a URL path.
    pub async fn resolve(&self, url_path: &str) -> Route {
        let script = self.locate(url_path);
        if let Some(manifest) = manifest_path_for(&script) {
            if is_file(&manifest).await {
                return Route::Manifest { script, manifest };
            }
        }
        Route::Static(script)
    }
}

/// Relative, `.`/`..`-free form of a URL path.
pub fn normalize(url_path: &str) -> PathBuf {
    let mut parts: Vec<&str> = Vec::new();
    for part in url_path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.iter().collect()
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/app/main.js"), PathBuf::from("app/main.js"));
        assert_eq!(normalize("//app/./main.js"), PathBuf::from("app/main.js"));
        assert_eq!(normalize("/app/../lib/x.js"), PathBuf::from("lib/x.js"));
        assert_eq!(normalize("/../../etc/passwd"), PathBuf::from("etc/passwd"));
        assert_eq!(normalize("/"), PathBuf::new());
    }

    #[tokio::test]
    async fn test_resolve() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "").unwrap();
        std::fs::write(dir.path().join("app.manifest"), "{}").unwrap();
        std::fs::write(dir.path().join("plain.js"), "").unwrap();
        std::fs::create_dir(dir.path().join("dir.manifest")).unwrap();

        let router = ContentRouter::new(dir.path());

        assert_eq!(
            router.resolve("/app.js").await,
            Route::Manifest {
                script: dir.path().join("app.js"),
                manifest: dir.path().join("app.manifest"),
            }
        );
        assert_eq!(router.resolve("/plain.js").await, Route::Static(dir.path().join("plain.js")));
        // A directory named like a manifest does not count.
        assert_eq!(router.resolve("/dir.js").await, Route::Static(dir.path().join("dir.js")));
        assert_eq!(
            router.resolve("/app.manifest").await,
            Route::Static(dir.path().join("app.manifest"))
        );
        // Sources need not exist for the manifest route.
        std::fs::write(dir.path().join("virtual.manifest"), "{}").unwrap();
        assert_eq!(router.resolve("/virtual.js").await.kind(), "manifest");
    }
}
