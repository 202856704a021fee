//! Per-resource build manifests.
//!
//! # Data Flow
//! ```text
//! GET /app.js
//!     → loader.rs (app.manifest → Manifest)
//!     → matcher.rs (CapabilityDescriptor × configs → first matching config)
//!     → Selection { file, bindings, transforms } handed to the build cache
//!
//! At startup:
//!     discovery.rs walks the content root (inventory, cache reset)
//! ```
//!
//! # Design Decisions
//! - Manifests are re-read on every request; the filesystem is the source of truth
//! - Config order is precedence; there is no specificity ranking
//! - Rules are pure functions over request-scoped data

pub mod discovery;
pub mod loader;
pub mod matcher;
pub mod schema;

pub use loader::{load_manifest, manifest_path_for, ManifestError};
pub use matcher::{ManifestMatcher, Selection};
pub use schema::{Manifest, ManifestConfig, SurfaceRequirement};
