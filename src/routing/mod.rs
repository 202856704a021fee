//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (URL path)
//!     → router.rs (normalize, join to content root)
//!     → sibling `<name>.manifest` exists? → Route::Manifest
//!     → otherwise                          → Route::Static
//! ```
//!
//! # Design Decisions
//! - Deterministic: same filesystem state always yields the same route
//! - No escaping the content root

pub mod router;

pub use router::{normalize, ContentRouter, Route};
