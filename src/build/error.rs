//! Build error definitions.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the external compiler.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The compiler process could not be started.
    #[error("failed to start compiler `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The compiler ran and reported failure.
    #[error("compiler exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The compiler did not finish within the configured deadline.
    #[error("compile timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that can occur while producing a build artifact.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The entry file selected by the manifest does not exist.
    #[error("source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The compile worker pool was shut down.
    #[error("compile worker pool is closed")]
    WorkersClosed,

    /// The compile task panicked before producing a result.
    #[error("compile task panicked")]
    Panicked,
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for build operations.
pub type BuildResult<T> = Result<T, BuildError>;
