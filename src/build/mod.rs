//! Build subsystem.
//!
//! # Data Flow
//! ```text
//! selected ManifestConfig (file, transforms, bindings)
//!     → cache.rs (freshness decision against filesystem metadata)
//!         → fresh: NotModified | Cached(file stream)
//!         → stale: single_flight.rs (one compile per key)
//!             → compiler.rs (external bundler, bounded + timed)
//!             → artifact + fingerprint.rs sidecar written atomically
//!             → Compiled(bytes)
//! ```

pub mod cache;
pub mod compiler;
pub mod error;
pub mod fingerprint;
pub mod single_flight;

pub use cache::{BuildCache, BuildOutcome, BuildRequest, BuildSettings, CompiledArtifact, SharedBuildError};
pub use compiler::{CommandCompiler, CompileRequest, Compiler};
pub use error::{BuildError, CompileError};
