//! Client capability descriptors.
//!
//! # Data Flow
//! ```text
//! Identification header (e.g. User-Agent)
//!     → parser.rs (clause extraction, never fails)
//!     → version.rs (dotted versions → ordinals)
//!     → CapabilityDescriptor (request-scoped, immutable)
//!     → manifest matcher
//! ```
//!
//! # Design Decisions
//! - Every clause is optional; absence yields an empty collection
//! - Info tokens keep their order (the API level comes from the first `API ` token)
//! - Surface names are stored fully qualified

pub mod parser;
pub mod version;

use std::borrow::Cow;

pub use parser::DescriptorParser;
pub use version::{VersionOrdinal, VersionRange};

/// Prefix marking the info token that carries the platform API level.
const API_PREFIX: &str = "API ";

/// A named optional client capability with its own version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub name: String,
    pub version: VersionOrdinal,
}

/// Structured capability data decoded from a client's identification header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub version: VersionOrdinal,
    pub info: Vec<String>,
    pub surfaces: Vec<Surface>,
    pub bindings: Vec<String>,
}

impl CapabilityDescriptor {
    /// Platform API level, taken from the first info token starting with `API `.
    ///
    /// Clients that do not report one are treated as supporting every level.
    pub fn api_level(&self) -> VersionOrdinal {
        self.info
            .iter()
            .find_map(|token| token.strip_prefix(API_PREFIX))
            .map(VersionOrdinal::parse)
            .unwrap_or(VersionOrdinal::MAX)
    }
}

/// Expand a leading `.` in a surface name against the default namespace.
pub fn qualify_surface<'a>(name: &'a str, namespace: &str) -> Cow<'a, str> {
    if name.starts_with('.') {
        Cow::Owned(format!("{namespace}{name}"))
    } else {
        Cow::Borrowed(name)
    }
}
