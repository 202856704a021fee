//! Response construction and error mapping.
//!
//! # Responsibilities
//! - Map serving failures to HTTP status codes
//! - Format `Last-Modified` dates
//!
//! # Design Decisions
//! - Clients get a generic reason phrase; details go to the log
//! - "Nothing to serve" conditions are 404, everything else 500

use std::path::PathBuf;
use std::time::SystemTime;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::build::{BuildError, SharedBuildError};
use crate::manifest::ManifestError;

/// Why a request could not be served.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("no such file: {}", .0.display())]
    NotFound(PathBuf),

    #[error("no config in {} matches the client", .manifest.display())]
    NoMatch { manifest: PathBuf },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Build(#[from] SharedBuildError),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ServeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::NoMatch { .. } => StatusCode::NOT_FOUND,
            Self::Manifest(ManifestError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Build(e) if matches!(e.as_ref(), BuildError::SourceMissing(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Nothing to serve");
        }
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, reason).into_response()
    }
}

/// `Last-Modified` form of `time` (IMF-fixdate, whole seconds).
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
