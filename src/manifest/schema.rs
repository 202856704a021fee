//! Manifest document schema.
//!
//! A manifest sits next to a script (`app.js` → `app.manifest`) and lists the
//! build configurations for that resource, most specific first:
//!
//! ```json
//! { "configs": [
//!     { "version": { "min": "0.5.0" }, "info": ["Android"], "api": 21,
//!       "surfaces": [".Console"], "bindings": ["sqlite3"],
//!       "file": "src/app.android.js", "transforms": ["envify"] },
//!     { "file": "src/app.js" }
//! ] }
//! ```
//!
//! Ranges accept a bare version (exact minimum, no maximum), a `{min, max}`
//! object with either end optional, or nothing at all (absent or `null`
//! means any version).

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

use crate::descriptor::{VersionOrdinal, VersionRange};

/// An ordered list of build configurations for one logical resource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub configs: Vec<ManifestConfig>,
}

/// One candidate build of a resource and the client requirements it targets.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestConfig {
    /// Accepted client versions.
    #[serde(default, alias = "versionRange")]
    pub version: VersionRange,

    /// Info tokens that must all be reported by the client.
    #[serde(default, alias = "infoRequirement", deserialize_with = "one_or_many")]
    pub info: Vec<String>,

    /// Accepted platform API levels.
    #[serde(default, alias = "apiRequirement")]
    pub api: VersionRange,

    /// Natively bound modules the client must provide. These are also
    /// excluded from bundling.
    #[serde(default, alias = "bindingRequirement", deserialize_with = "one_or_many")]
    pub bindings: Vec<String>,

    /// Surfaces of which the client must provide at least one.
    #[serde(default, alias = "surfaceRequirement")]
    pub surfaces: Vec<SurfaceRequirement>,

    /// Entry file to compile, relative to the content root.
    pub file: PathBuf,

    /// Transforms applied to every bundled file.
    #[serde(default)]
    pub transforms: Vec<String>,
}

/// A required surface, optionally constrained to a version range.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawSurface")]
pub struct SurfaceRequirement {
    pub name: String,
    pub version: VersionRange,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSurface {
    Name(String),
    Detailed(DetailedSurface),
}

#[derive(Deserialize)]
struct DetailedSurface {
    #[serde(alias = "name")]
    surface: String,
    #[serde(default)]
    version: VersionRange,
}

impl From<RawSurface> for SurfaceRequirement {
    fn from(raw: RawSurface) -> Self {
        match raw {
            RawSurface::Name(name) => Self {
                name,
                version: VersionRange::ANY,
            },
            RawSurface::Detailed(detailed) => Self {
                name: detailed.surface,
                version: detailed.version,
            },
        }
    }
}

/// A version written either as a string or a JSON number.
#[derive(Deserialize)]
#[serde(untagged)]
enum VersionText {
    Text(String),
    Number(serde_json::Number),
}

impl VersionText {
    fn ordinal(&self) -> VersionOrdinal {
        match self {
            Self::Text(text) => VersionOrdinal::parse(text),
            Self::Number(number) => VersionOrdinal::parse(&number.to_string()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRange {
    Bare(VersionText),
    Bounds {
        #[serde(default)]
        min: Option<VersionText>,
        #[serde(default)]
        max: Option<VersionText>,
    },
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let range = match Option::<RawRange>::deserialize(deserializer)? {
            None => VersionRange::ANY,
            Some(RawRange::Bare(min)) => VersionRange::at_least(min.ordinal()),
            Some(RawRange::Bounds { min, max }) => VersionRange::new(
                min.map(|v| v.ordinal()).unwrap_or(VersionOrdinal::ZERO),
                max.map(|v| v.ordinal()).unwrap_or(VersionOrdinal::MAX),
            ),
        };
        Ok(range)
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(token) => vec![token],
        OneOrMany::Many(tokens) => tokens,
    })
}
